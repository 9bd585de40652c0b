use crate::compiler::{CommandCompiler, CompileError, NodeOrdering, Selection};
use crate::core::error::GraphError;
use crate::core::graph::{ConnectOutcome, GraphModel, RemovedNode};
use crate::core::models::ids::NodeId;
use crate::core::models::node::Position;
use crate::core::models::port::{Connection, PortRef};
use crate::core::propagation::PropagationReport;
use crate::core::registry::PortTypeRegistry;
use crate::session::{LoadedSession, RestoreIssue, SessionCodec, SessionDocument, SessionError};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Graph error: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },

    #[error("Session error: {source}")]
    Session {
        #[from]
        source: SessionError,
    },
}

/// What the front end needs after an edit: the refreshed preview and the
/// values that moved downstream.
///
/// The edit itself has been applied whenever an update is returned. A graph
/// that cannot be previewed (a missing value, or a cycle under topological
/// ordering) shows up as an `Err` preview, not as a failed edit.
#[derive(Debug)]
pub struct EditorUpdate {
    pub preview: Result<Vec<String>, CompileError>,
    pub propagation: PropagationReport,
}

/// A pipeline being edited: the graph, opaque front-end state and the
/// ordering used for previews and runs.
///
/// Every mutating call returns an [`EditorUpdate`] so a front end can refresh
/// its command preview without recomputing anything itself.
#[derive(Debug, Clone)]
pub struct Pipeline {
    graph: GraphModel,
    ui: Value,
    ordering: NodeOrdering,
}

impl Pipeline {
    pub fn new(registry: Arc<PortTypeRegistry>) -> Self {
        Self {
            graph: GraphModel::new(registry),
            ui: Value::Null,
            ordering: NodeOrdering::default(),
        }
    }

    /// Adopts a restored session. The returned index maps document ids to nodes.
    pub fn from_session(session: LoadedSession) -> (Self, SessionIndex) {
        let LoadedSession {
            graph,
            ui,
            ids,
            issues,
        } = session;
        let pipeline = Self {
            graph,
            ui,
            ordering: NodeOrdering::default(),
        };
        (pipeline, SessionIndex { ids, issues })
    }

    pub fn open(
        registry: Arc<PortTypeRegistry>,
        path: &Path,
    ) -> Result<(Self, SessionIndex), PipelineError> {
        Ok(Self::from_session(SessionCodec::load_from_path(
            registry, path,
        )?))
    }

    pub fn with_ordering(mut self, ordering: NodeOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn ui(&self) -> &Value {
        &self.ui
    }

    pub fn set_ui(&mut self, ui: Value) {
        self.ui = ui;
    }

    pub fn ordering(&self) -> NodeOrdering {
        self.ordering
    }

    pub fn set_ordering(&mut self, ordering: NodeOrdering) {
        self.ordering = ordering;
    }

    /// Flag-pair preview of every node.
    pub fn preview(&self) -> Result<Vec<String>, CompileError> {
        CommandCompiler::compile_graph(&self.graph, &Selection::All, self.ordering)
    }

    /// Template commands for a run request.
    pub fn commands(&self, selection: &Selection) -> Result<Vec<String>, CompileError> {
        CommandCompiler::compile_script(&self.graph, selection, self.ordering)
    }

    fn update(&self, propagation: PropagationReport) -> EditorUpdate {
        let preview = self.preview();
        if let Err(e) = &preview {
            warn!("Preview unavailable after edit: {}", e);
        }
        EditorUpdate {
            preview,
            propagation,
        }
    }

    pub fn add_node(&mut self, type_id: &str, position: Position) -> Result<NodeId, PipelineError> {
        Ok(self.graph.add_node(type_id, position)?)
    }

    pub fn remove_node(&mut self, node: NodeId) -> Result<RemovedNode, PipelineError> {
        Ok(self.graph.remove_node(node)?)
    }

    /// Handles a property-changed event from the front end.
    #[instrument(skip(self, value))]
    pub fn property_changed(
        &mut self,
        node: NodeId,
        key: &str,
        value: &str,
    ) -> Result<EditorUpdate, PipelineError> {
        let propagation = self.graph.set_property(node, key, value)?;
        debug!("{} downstream value(s) updated", propagation.updated.len());
        Ok(self.update(propagation))
    }

    pub fn connect(
        &mut self,
        a: PortRef,
        b: PortRef,
    ) -> Result<(ConnectOutcome, EditorUpdate), PipelineError> {
        let outcome = self.graph.connect(a, b)?;
        let update = self.update(outcome.propagation.clone());
        Ok((outcome, update))
    }

    pub fn disconnect(&mut self, connection: &Connection) -> Result<EditorUpdate, PipelineError> {
        self.graph.disconnect(connection)?;
        Ok(self.update(PropagationReport::default()))
    }

    pub fn rename_node(&mut self, node: NodeId, name: &str) -> Result<(), PipelineError> {
        Ok(self.graph.rename_node(node, name)?)
    }

    /// Moves a node. The preview changes when the horizontal order does.
    pub fn move_node(&mut self, node: NodeId, position: Position) -> Result<EditorUpdate, PipelineError> {
        self.graph.move_node(node, position)?;
        Ok(self.update(PropagationReport::default()))
    }

    pub fn to_document(&self) -> SessionDocument {
        SessionCodec::save(&self.graph, &self.ui)
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        Ok(SessionCodec::save_to_path(&self.graph, &self.ui, path)?)
    }
}

/// Document ids and restore problems of an opened session.
#[derive(Debug, Clone, Default)]
pub struct SessionIndex {
    pub ids: IndexMap<String, NodeId>,
    pub issues: Vec<RestoreIssue>,
}

impl SessionIndex {
    pub fn get(&self, document_id: &str) -> Option<NodeId> {
        self.ids.get(document_id).copied()
    }
}
