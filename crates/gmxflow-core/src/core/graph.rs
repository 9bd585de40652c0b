use super::error::GraphError;
use super::models::ids::NodeId;
use super::models::node::{NodeInstance, Position};
use super::models::port::{Connection, Port, PortDirection, PortRef};
use super::models::property::MENU_SELECTOR_KEY;
use super::propagation::{PropagationReport, PropagationWarning, PropertyPropagator};
use super::registry::PortTypeRegistry;
use slotmap::SlotMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Result of a successful [`GraphModel::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// The stored edge, always oriented output -> input.
    pub connection: Connection,
    /// The edge previously feeding the same input port, if one was displaced.
    pub replaced: Option<Connection>,
    pub propagation: PropagationReport,
}

/// A node taken out of the graph together with the edges that went with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    pub node: NodeInstance,
    pub connections: Vec<Connection>,
}

/// The pipeline graph: node instances, their typed ports and the directed
/// edges between them.
///
/// Every edge references ports that exist, runs from an output port to an
/// input port, and carries a kind the input accepts. An input port has at most
/// one incoming edge; output ports fan out freely. Cycles are representable.
#[derive(Debug, Clone)]
pub struct GraphModel {
    registry: Arc<PortTypeRegistry>,
    nodes: SlotMap<NodeId, NodeInstance>,
    /// Insertion order of live nodes.
    order: Vec<NodeId>,
    connections: Vec<Connection>,
}

impl GraphModel {
    /// Creates an empty graph whose nodes are instantiated from `registry`.
    pub fn new(registry: Arc<PortTypeRegistry>) -> Self {
        Self {
            registry,
            nodes: SlotMap::with_key(),
            order: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn registry(&self) -> &PortTypeRegistry {
        &self.registry
    }

    /// Instantiates a node of `type_id` at `position` with default base properties.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Registry`] if the type is not registered.
    #[instrument(skip(self))]
    pub fn add_node(&mut self, type_id: &str, position: Position) -> Result<NodeId, GraphError> {
        let node_type = self.registry.spec_for(type_id)?;
        let id = self
            .nodes
            .insert_with_key(|id| NodeInstance::new(id, node_type, position));
        self.order.push(id);
        debug!("Added node {:?} at ({}, {})", id, position.x, position.y);
        Ok(id)
    }

    /// Removes a node and every connection touching it.
    ///
    /// # Return
    ///
    /// The removed node and the connections dropped with it, in storage order.
    #[instrument(skip(self))]
    pub fn remove_node(&mut self, id: NodeId) -> Result<RemovedNode, GraphError> {
        let node = self.nodes.remove(id).ok_or(GraphError::NodeNotFound(id))?;
        self.order.retain(|&n| n != id);

        let (dropped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(|c| c.touches(id));
        self.connections = kept;

        debug!(
            "Removed node '{}' and {} connection(s)",
            node.name(),
            dropped.len()
        );
        Ok(RemovedNode {
            node,
            connections: dropped,
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInstance> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    fn require(&self, id: NodeId) -> Result<&NodeInstance, GraphError> {
        self.nodes.get(id).ok_or(GraphError::NodeNotFound(id))
    }

    fn require_mut(&mut self, id: NodeId) -> Result<&mut NodeInstance, GraphError> {
        self.nodes.get_mut(id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInstance> {
        self.order.iter().filter_map(|id| self.nodes.get(*id))
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Resolves a port reference against the current graph.
    pub fn port(&self, port: &PortRef) -> Result<&Port, GraphError> {
        self.require(port.node)?
            .port(&port.port)
            .ok_or_else(|| GraphError::PortNotFound {
                node: port.node,
                port: port.port.clone(),
            })
    }

    /// Edges leaving an output port.
    pub fn outgoing<'a>(&'a self, source: &'a PortRef) -> impl Iterator<Item = &'a Connection> {
        self.connections.iter().filter(move |c| &c.source == source)
    }

    /// The edge feeding an input port, if any.
    pub fn incoming(&self, dest: &PortRef) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.dest == dest)
    }

    /// Connects two ports and synchronizes the destination property.
    ///
    /// The endpoints may be given in either order; the stored edge always runs
    /// from the output port to the input port. A previous edge into the same
    /// input port is replaced. After insertion the source's mapped value is
    /// copied onto the destination and carried further downstream.
    ///
    /// # Errors
    ///
    /// * [`GraphError::NodeNotFound`] / [`GraphError::PortNotFound`] for a dangling reference.
    /// * [`GraphError::Direction`] if both ports point the same way.
    /// * [`GraphError::IncompatibleKind`] if the input does not accept the output's kind.
    #[instrument(skip_all, fields(a = %a.port, b = %b.port))]
    pub fn connect(&mut self, a: PortRef, b: PortRef) -> Result<ConnectOutcome, GraphError> {
        let (connection, replaced) = self.attach_connection(a, b)?;
        let propagation = PropertyPropagator::sync_connection(self, &connection);
        info!(
            "Connected {} -> {} ({} propert{} updated)",
            connection.source.port,
            connection.dest.port,
            propagation.updated.len(),
            if propagation.updated.len() == 1 { "y" } else { "ies" }
        );
        Ok(ConnectOutcome {
            connection,
            replaced,
            propagation,
        })
    }

    /// Validates and stores an edge without copying any value across it.
    pub(crate) fn attach_connection(
        &mut self,
        a: PortRef,
        b: PortRef,
    ) -> Result<(Connection, Option<Connection>), GraphError> {
        let connection = self.normalize(a, b)?;

        let existing = self
            .connections
            .iter()
            .position(|c| c.dest == connection.dest);
        let replaced = existing.map(|index| self.connections.remove(index));
        if let Some(old) = &replaced {
            debug!(
                "Input '{}' was fed by '{}'; replacing",
                old.dest.port, old.source.port
            );
        }

        self.connections.push(connection.clone());
        Ok((connection, replaced))
    }

    fn normalize(&self, a: PortRef, b: PortRef) -> Result<Connection, GraphError> {
        let port_a = self.port(&a)?;
        let port_b = self.port(&b)?;

        if port_a.direction == port_b.direction {
            return Err(GraphError::Direction {
                direction: port_a.direction,
                first: a.port,
                second: b.port,
            });
        }

        let (source, dest, source_port, dest_port) = match port_a.direction {
            PortDirection::Out => (a, b, port_a, port_b),
            PortDirection::In => (b, a, port_b, port_a),
        };

        if !dest_port.accepts_kind(&source_port.kind) {
            return Err(GraphError::IncompatibleKind {
                source_port: source.port,
                source_kind: source_port.kind.clone(),
                dest_port: dest.port,
                accepted: dest_port.accepts.clone(),
            });
        }

        Ok(Connection { source, dest })
    }

    /// Removes an existing edge. Values already copied across it stay as they are.
    pub fn disconnect(&mut self, connection: &Connection) -> Result<(), GraphError> {
        let index = self
            .connections
            .iter()
            .position(|c| c == connection)
            .ok_or_else(|| GraphError::ConnectionNotFound {
                source_port: connection.source.port.clone(),
                dest_port: connection.dest.port.clone(),
            })?;
        self.connections.remove(index);
        debug!(
            "Disconnected {} -> {}",
            connection.source.port, connection.dest.port
        );
        Ok(())
    }

    /// Applies an edit coming from the property editor.
    ///
    /// The menu selector key activates the optional property named by `value`
    /// and is never stored. Any other key overwrites a materialized property
    /// and pushes the new value downstream through output ports mapping it.
    /// A combo value outside its declared choices is stored but warned about.
    #[instrument(skip(self, value))]
    pub fn set_property(
        &mut self,
        node: NodeId,
        key: &str,
        value: impl Into<String>,
    ) -> Result<PropagationReport, GraphError> {
        let value = value.into();

        if key == MENU_SELECTOR_KEY {
            let mut report = PropagationReport::default();
            if value.is_empty() {
                return Ok(report);
            }
            match self.activate_optional(node, &value) {
                Ok(_) => {}
                Err(GraphError::UnknownOptionalProperty { flag, .. }) => {
                    report.warn(PropagationWarning::UnknownMenuSelection { node, flag });
                }
                Err(e) => return Err(e),
            }
            return Ok(report);
        }

        self.write_property(node, key, value)?;

        let mut report = PropagationReport::default();
        if let Some(property) = self.node(node).and_then(|n| n.property(key)) {
            if !property.is_valid_choice() {
                report.warn(PropagationWarning::ValueNotInChoices {
                    node,
                    flag: key.to_string(),
                    value: property.value.clone(),
                });
            }
        }
        report.merge(PropertyPropagator::propagate_edit(self, node, key));
        Ok(report)
    }

    /// Materializes an optional property with its default value.
    ///
    /// Returns `Ok(false)` if it was already active; the current value is kept.
    pub fn activate_optional(&mut self, node: NodeId, flag: &str) -> Result<bool, GraphError> {
        let registry = Arc::clone(&self.registry);
        let instance = self.require_mut(node)?;
        let node_type = registry.spec_for(instance.type_id())?;
        let activated = instance.activate_optional(node_type, flag)?;
        if activated {
            info!("Added optional property '{}' to '{}'", flag, instance.name());
        } else {
            info!(
                "Optional property '{}' already exists on '{}'",
                flag,
                instance.name()
            );
        }
        Ok(activated)
    }

    pub fn rename_node(&mut self, node: NodeId, name: impl Into<String>) -> Result<(), GraphError> {
        self.require_mut(node)?.set_name(name);
        Ok(())
    }

    pub fn move_node(&mut self, node: NodeId, position: Position) -> Result<(), GraphError> {
        self.require_mut(node)?.set_position(position);
        Ok(())
    }

    /// Overwrites a materialized property without propagating.
    pub(crate) fn write_property(
        &mut self,
        node: NodeId,
        flag: &str,
        value: String,
    ) -> Result<bool, GraphError> {
        self.require_mut(node)?.set_value(flag, value)
    }
}
