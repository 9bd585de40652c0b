use super::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic tag describing the artifact a port carries, e.g. `gro_file`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataKind(String);

impl DataKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DataKind {
    fn from(kind: &str) -> Self {
        Self(kind.to_string())
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    In,
    Out,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::In => f.write_str("in"),
            PortDirection::Out => f.write_str("out"),
        }
    }
}

/// A typed connection point on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub owner: NodeId,
    pub name: String,
    pub direction: PortDirection,
    pub kind: DataKind,
    /// Kinds a source may carry to connect here. Empty for output ports.
    pub accepts: Vec<DataKind>,
    /// The property of the owning node this port is a view onto.
    pub property: Option<String>,
}

impl Port {
    pub fn accepts_kind(&self, kind: &DataKind) -> bool {
        self.accepts.iter().any(|k| k == kind)
    }
}

/// Addresses one port of one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: String,
}

impl PortRef {
    pub fn new(node: NodeId, port: impl Into<String>) -> Self {
        Self {
            node,
            port: port.into(),
        }
    }
}

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub source: PortRef,
    pub dest: PortRef,
}

impl Connection {
    pub fn touches(&self, node: NodeId) -> bool {
        self.source.node == node || self.dest.node == node
    }
}
