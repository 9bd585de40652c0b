use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level JSON shape of a saved session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub graph: GraphDocument,
    /// Presentation state owned by the front end. Never interpreted here.
    #[serde(default)]
    pub ui: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: IndexMap<String, NodeDocument>,
    #[serde(default)]
    pub connections: Vec<ConnectionDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocument {
    pub type_id: String,
    pub name: String,
    pub position: [f64; 2],
    /// Base property values.
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    /// Activated optional properties, in activation order.
    #[serde(default)]
    pub added_properties: IndexMap<String, String>,
}

/// Document as read from disk. Only the envelope is decoded strictly; nodes
/// and connections stay raw so each one can fail on its own.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSessionDocument {
    pub graph: RawGraphDocument,
    #[serde(default)]
    pub ui: Value,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawGraphDocument {
    #[serde(default)]
    pub nodes: IndexMap<String, Value>,
    #[serde(default)]
    pub connections: Vec<Value>,
}

/// A node entry whose property values are not yet checked.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawNodeDocument {
    pub type_id: String,
    pub name: String,
    pub position: [f64; 2],
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
    #[serde(default)]
    pub added_properties: IndexMap<String, Value>,
}

/// `[source node, source port, destination node, destination port]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDocument(pub String, pub String, pub String, pub String);

impl ConnectionDocument {
    pub fn new(
        source: impl Into<String>,
        source_port: impl Into<String>,
        dest: impl Into<String>,
        dest_port: impl Into<String>,
    ) -> Self {
        Self(source.into(), source_port.into(), dest.into(), dest_port.into())
    }
}

impl std::fmt::Display for ConnectionDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} -> {}.{}", self.0, self.1, self.2, self.3)
    }
}
