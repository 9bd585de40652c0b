//! # Session Persistence
//!
//! Saves a pipeline graph plus opaque front-end state to JSON and rebuilds it.
//!
//! Restoration is lenient: malformed or unknown nodes, undeclared properties
//! and edges that no longer validate are skipped and reported as
//! [`RestoreIssue`]s, while everything else is rebuilt. Edges are restored
//! without connect-time synchronization, so saved values come back verbatim.

mod document;

pub use document::{ConnectionDocument, GraphDocument, NodeDocument, SessionDocument};

use document::{RawNodeDocument, RawSessionDocument};

use crate::core::graph::GraphModel;
use crate::core::models::ids::NodeId;
use crate::core::models::node::Position;
use crate::core::models::port::{Connection, PortRef};
use crate::core::models::property::MENU_SELECTOR_KEY;
use crate::core::registry::PortTypeRegistry;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Malformed session document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// A part of a session document that could not be restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreIssue {
    #[error("Node '{node}' has unknown type '{type_id}' and was skipped")]
    UnknownNodeType { node: String, type_id: String },

    #[error("Node '{node}' has no property '{flag}'; value ignored")]
    UnknownProperty { node: String, flag: String },

    #[error("Node '{node}' is malformed and was skipped: {reason}")]
    MalformedNode { node: String, reason: String },

    #[error("Node '{node}' has a non-string value for '{flag}'; value ignored")]
    InvalidValue { node: String, flag: String },

    #[error("Connection {connection} references missing node '{node}'")]
    MissingNode {
        connection: String,
        node: String,
    },

    #[error("Connection {connection} is invalid: {reason}")]
    InvalidConnection { connection: String, reason: String },
}

/// A graph rebuilt from a session document.
#[derive(Debug)]
pub struct LoadedSession {
    pub graph: GraphModel,
    pub ui: Value,
    /// Document id of every restored node.
    pub ids: IndexMap<String, NodeId>,
    pub issues: Vec<RestoreIssue>,
}

impl LoadedSession {
    pub fn node_id(&self, document_id: &str) -> Option<NodeId> {
        self.ids.get(document_id).copied()
    }
}

pub struct SessionCodec;

impl SessionCodec {
    /// Document ids assigned on save: `node-<n>` in insertion order.
    pub fn document_ids(graph: &GraphModel) -> IndexMap<NodeId, String> {
        graph
            .node_ids()
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, format!("node-{}", index)))
            .collect()
    }

    /// Snapshots `graph` and `ui` into a document.
    pub fn save(graph: &GraphModel, ui: &Value) -> SessionDocument {
        let ids = Self::document_ids(graph);
        let registry = graph.registry();

        let nodes = graph
            .nodes()
            .filter_map(|node| {
                let id = ids.get(&node.id())?.clone();
                let optional = |flag: &str| {
                    registry
                        .get(node.type_id())
                        .is_some_and(|t| t.is_optional(flag))
                };
                let properties = node
                    .flag_values()
                    .filter(|(flag, _)| !optional(*flag))
                    .map(|(flag, value)| (flag.to_string(), value.to_string()))
                    .collect();
                let added_properties = node
                    .activated_optional()
                    .filter_map(|flag| node.value(flag).map(|v| (flag.to_string(), v.to_string())))
                    .collect();
                let position = node.position();
                Some((
                    id,
                    NodeDocument {
                        type_id: node.type_id().to_string(),
                        name: node.name().to_string(),
                        position: [position.x, position.y],
                        properties,
                        added_properties,
                    },
                ))
            })
            .collect();

        let connections = graph
            .connections()
            .iter()
            .filter_map(|c| {
                Some(ConnectionDocument::new(
                    ids.get(&c.source.node)?.clone(),
                    c.source.port.clone(),
                    ids.get(&c.dest.node)?.clone(),
                    c.dest.port.clone(),
                ))
            })
            .collect();

        SessionDocument {
            graph: GraphDocument { nodes, connections },
            ui: ui.clone(),
        }
    }

    pub fn to_json_string(graph: &GraphModel, ui: &Value) -> Result<String, SessionError> {
        Ok(serde_json::to_string_pretty(&Self::save(graph, ui))?)
    }

    #[instrument(skip(graph, ui))]
    pub fn save_to_path(graph: &GraphModel, ui: &Value, path: &Path) -> Result<(), SessionError> {
        let content = Self::to_json_string(graph, ui)?;
        std::fs::write(path, content).map_err(|e| SessionError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        info!("Saved session with {} node(s)", graph.len());
        Ok(())
    }

    /// Rebuilds a graph from `document` against `registry`.
    pub fn load(registry: Arc<PortTypeRegistry>, document: SessionDocument) -> LoadedSession {
        let mut restorer = Restorer::new(registry);
        for (doc_id, node_doc) in document.graph.nodes {
            restorer.node(doc_id, node_doc);
        }
        for connection in document.graph.connections {
            restorer.connection(connection);
        }
        restorer.finish(document.ui)
    }

    /// Parses and restores a session.
    ///
    /// Only a broken envelope (not JSON, or no `graph` object) is an error. A
    /// node or connection entry that does not decode is reported and skipped,
    /// and so is a property value that is not a string.
    pub fn from_json_str(
        registry: Arc<PortTypeRegistry>,
        content: &str,
    ) -> Result<LoadedSession, SessionError> {
        let document: RawSessionDocument = serde_json::from_str(content)?;
        let mut restorer = Restorer::new(registry);

        for (doc_id, value) in document.graph.nodes {
            match serde_json::from_value::<RawNodeDocument>(value) {
                Ok(raw) => {
                    let node_doc = restorer.checked(&doc_id, raw);
                    restorer.node(doc_id, node_doc);
                }
                Err(e) => restorer.issues.push(RestoreIssue::MalformedNode {
                    node: doc_id,
                    reason: e.to_string(),
                }),
            }
        }

        for value in document.graph.connections {
            let label = value.to_string();
            match serde_json::from_value::<ConnectionDocument>(value) {
                Ok(connection) => restorer.connection(connection),
                Err(e) => restorer.issues.push(RestoreIssue::InvalidConnection {
                    connection: label,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(restorer.finish(document.ui))
    }

    #[instrument(skip(registry))]
    pub fn load_from_path(
        registry: Arc<PortTypeRegistry>,
        path: &Path,
    ) -> Result<LoadedSession, SessionError> {
        let content = std::fs::read_to_string(path).map_err(|e| SessionError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_json_str(registry, &content)
    }
}

/// Rebuilds a graph entry by entry, collecting whatever cannot be restored.
struct Restorer {
    graph: GraphModel,
    ids: IndexMap<String, NodeId>,
    /// Document label of every restored edge, for reporting replacements.
    labels: HashMap<Connection, String>,
    issues: Vec<RestoreIssue>,
}

impl Restorer {
    fn new(registry: Arc<PortTypeRegistry>) -> Self {
        Self {
            graph: GraphModel::new(registry),
            ids: IndexMap::new(),
            labels: HashMap::new(),
            issues: Vec::new(),
        }
    }

    /// Keeps the string values of `raw`, reporting every other value.
    fn checked(&mut self, doc_id: &str, raw: RawNodeDocument) -> NodeDocument {
        let mut strings = |values: IndexMap<String, Value>| -> IndexMap<String, String> {
            values
                .into_iter()
                .filter_map(|(flag, value)| match value {
                    Value::String(value) => Some((flag, value)),
                    _ => {
                        self.issues.push(RestoreIssue::InvalidValue {
                            node: doc_id.to_string(),
                            flag,
                        });
                        None
                    }
                })
                .collect()
        };
        let properties = strings(raw.properties);
        let added_properties = strings(raw.added_properties);

        NodeDocument {
            type_id: raw.type_id,
            name: raw.name,
            position: raw.position,
            properties,
            added_properties,
        }
    }

    fn node(&mut self, doc_id: String, node_doc: NodeDocument) {
        let position = Position::new(node_doc.position[0], node_doc.position[1]);
        let id = match self.graph.add_node(&node_doc.type_id, position) {
            Ok(id) => id,
            Err(_) => {
                self.issues.push(RestoreIssue::UnknownNodeType {
                    node: doc_id,
                    type_id: node_doc.type_id,
                });
                return;
            }
        };
        if let Err(e) = self.graph.rename_node(id, node_doc.name) {
            debug!("Could not rename restored node: {}", e);
        }

        let values = node_doc
            .properties
            .into_iter()
            .chain(node_doc.added_properties);
        for (flag, value) in values {
            if flag == MENU_SELECTOR_KEY {
                continue;
            }
            self.value(id, &doc_id, flag, value);
        }
        self.ids.insert(doc_id, id);
    }

    /// Writes one saved value back, activating optional flags first.
    fn value(&mut self, id: NodeId, doc_id: &str, flag: String, value: String) {
        let Some(node) = self.graph.node(id) else {
            return;
        };
        let declared_optional = self
            .graph
            .registry()
            .get(node.type_id())
            .is_some_and(|t| t.is_optional(&flag));

        if node.property(&flag).is_none() && declared_optional {
            if let Err(e) = self.graph.activate_optional(id, &flag) {
                debug!("Could not activate '{}': {}", flag, e);
            }
        }

        if self.graph.write_property(id, &flag, value).is_err() {
            self.issues.push(RestoreIssue::UnknownProperty {
                node: doc_id.to_string(),
                flag,
            });
        }
    }

    fn connection(&mut self, connection: ConnectionDocument) {
        let label = connection.to_string();
        let ConnectionDocument(source, source_port, dest, dest_port) = connection;

        let (source_id, dest_id) = match (self.ids.get(&source), self.ids.get(&dest)) {
            (Some(s), Some(d)) => (*s, *d),
            (None, _) => {
                self.issues.push(RestoreIssue::MissingNode {
                    connection: label,
                    node: source,
                });
                return;
            }
            (_, None) => {
                self.issues.push(RestoreIssue::MissingNode {
                    connection: label,
                    node: dest,
                });
                return;
            }
        };

        match self.graph.attach_connection(
            PortRef::new(source_id, source_port),
            PortRef::new(dest_id, dest_port),
        ) {
            Ok((restored, replaced)) => {
                if let Some(old) = replaced {
                    self.issues.push(RestoreIssue::InvalidConnection {
                        connection: self.labels.remove(&old).unwrap_or_default(),
                        reason: format!("input already fed by {}; the later edge wins", label),
                    });
                }
                self.labels.insert(restored, label);
            }
            Err(e) => self.issues.push(RestoreIssue::InvalidConnection {
                connection: label,
                reason: e.to_string(),
            }),
        }
    }

    fn finish(self, ui: Value) -> LoadedSession {
        for issue in &self.issues {
            warn!("{}", issue);
        }
        info!(
            "Restored {} node(s) and {} connection(s) with {} issue(s)",
            self.graph.len(),
            self.graph.connections().len(),
            self.issues.len()
        );

        LoadedSession {
            graph: self.graph,
            ui,
            ids: self.ids,
            issues: self.issues,
        }
    }
}
