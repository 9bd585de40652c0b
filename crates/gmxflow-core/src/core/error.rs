use crate::core::models::ids::NodeId;
use crate::core::models::port::{DataKind, PortDirection};
use crate::core::registry::RegistryError;
use thiserror::Error;

/// Errors raised by graph mutations. The graph is left in its last valid
/// state whenever one of these is returned.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Node {0:?} does not exist in the graph")]
    NodeNotFound(NodeId),

    #[error("Node {node:?} has no port named '{port}'")]
    PortNotFound { node: NodeId, port: String },

    #[error("Cannot connect two '{direction}' ports ('{first}' and '{second}')")]
    Direction {
        direction: PortDirection,
        first: String,
        second: String,
    },

    #[error(
        "Port '{dest_port}' accepts {accepted:?}, but '{source_port}' carries '{source_kind}'"
    )]
    IncompatibleKind {
        source_port: String,
        source_kind: DataKind,
        dest_port: String,
        accepted: Vec<DataKind>,
    },

    #[error("Connection {source_port} -> {dest_port} does not exist")]
    ConnectionNotFound {
        source_port: String,
        dest_port: String,
    },

    #[error("Property '{flag}' is not materialized on node {node:?}")]
    PropertyNotMaterialized { node: NodeId, flag: String },

    #[error("Node type '{type_id}' declares no optional property '{flag}'")]
    UnknownOptionalProperty { type_id: String, flag: String },
}
