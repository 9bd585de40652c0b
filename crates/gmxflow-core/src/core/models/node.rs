use super::ids::NodeId;
use super::port::{Port, PortDirection};
use super::property::Property;
use crate::core::error::GraphError;
use crate::core::registry::NodeType;
use indexmap::{IndexMap, IndexSet};
use nalgebra::Point2;

/// Canvas position of a node. Only `x` carries meaning for the engine: it is
/// the default pipeline order.
pub type Position = Point2<f64>;

/// One configured step of the pipeline.
///
/// Property insertion order is preserved and is the argument order of the
/// flag-pair rendering. Base properties are materialized at construction;
/// optional ones only after [`activate_optional`](Self::activate_optional).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInstance {
    id: NodeId,
    type_id: String,
    name: String,
    position: Position,
    properties: IndexMap<String, Property>,
    ports: Vec<Port>,
    activated_optional: IndexSet<String>,
}

impl NodeInstance {
    /// Builds a node with default base properties and the ports declared by `node_type`.
    pub(crate) fn new(id: NodeId, node_type: &NodeType, position: Position) -> Self {
        let properties = node_type
            .base_properties
            .iter()
            .map(|(flag, spec)| (flag.clone(), spec.instantiate()))
            .collect();

        let inputs = node_type.inputs.iter().map(|(name, spec)| Port {
            owner: id,
            name: name.clone(),
            direction: PortDirection::In,
            kind: spec.kind.clone(),
            accepts: spec.accepts.clone(),
            property: spec.property.clone(),
        });
        let outputs = node_type.outputs.iter().map(|(name, spec)| Port {
            owner: id,
            name: name.clone(),
            direction: PortDirection::Out,
            kind: spec.kind.clone(),
            accepts: Vec::new(),
            property: spec.property.clone(),
        });

        Self {
            id,
            type_id: node_type.type_id.clone(),
            name: node_type.display_name.clone(),
            position,
            properties,
            ports: inputs.chain(outputs).collect(),
            activated_optional: IndexSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn properties(&self) -> &IndexMap<String, Property> {
        &self.properties
    }

    pub fn property(&self, flag: &str) -> Option<&Property> {
        self.properties.get(flag)
    }

    pub fn value(&self, flag: &str) -> Option<&str> {
        self.properties.get(flag).map(|p| p.value.as_str())
    }

    /// `(flag, value)` pairs in insertion order.
    pub fn flag_values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(flag, p)| (flag.as_str(), p.value.as_str()))
    }

    /// Overwrites a materialized property and reports whether the value changed.
    pub(crate) fn set_value(
        &mut self,
        flag: &str,
        value: impl Into<String>,
    ) -> Result<bool, GraphError> {
        let property =
            self.properties
                .get_mut(flag)
                .ok_or_else(|| GraphError::PropertyNotMaterialized {
                    node: self.id,
                    flag: flag.to_string(),
                })?;
        let value = value.into();
        if property.value == value {
            return Ok(false);
        }
        property.value = value;
        Ok(true)
    }

    /// Materializes an optional property with its default value.
    ///
    /// Returns `Ok(false)` when the property was already active.
    pub(crate) fn activate_optional(
        &mut self,
        node_type: &NodeType,
        flag: &str,
    ) -> Result<bool, GraphError> {
        let spec = node_type.optional_properties.get(flag).ok_or_else(|| {
            GraphError::UnknownOptionalProperty {
                type_id: self.type_id.clone(),
                flag: flag.to_string(),
            }
        })?;
        if !self.activated_optional.insert(flag.to_string()) {
            return Ok(false);
        }
        self.properties.insert(flag.to_string(), spec.instantiate());
        Ok(true)
    }

    pub fn is_activated(&self, flag: &str) -> bool {
        self.activated_optional.contains(flag)
    }

    /// Activated optional flags in activation order.
    pub fn activated_optional(&self) -> impl Iterator<Item = &str> {
        self.activated_optional.iter().map(String::as_str)
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Port> {
        self.ports
            .iter()
            .filter(|p| p.direction == PortDirection::In)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Port> {
        self.ports
            .iter()
            .filter(|p| p.direction == PortDirection::Out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::PortTypeRegistry;
    use slotmap::SlotMap;

    fn editconf() -> NodeInstance {
        let registry = PortTypeRegistry::builtin().unwrap();
        let mut keys: SlotMap<NodeId, ()> = SlotMap::with_key();
        let id = keys.insert(());
        NodeInstance::new(
            id,
            registry.spec_for("editconf").unwrap(),
            Position::new(10.0, 20.0),
        )
    }

    #[test]
    fn new_node_materializes_base_properties_only() {
        let node = editconf();
        let flags: Vec<_> = node.flag_values().map(|(f, _)| f).collect();
        assert_eq!(flags, vec!["-f", "-o", "-bt", "-box"]);
        assert_eq!(node.value("-bt"), Some("cubic"));
        assert_eq!(node.value("-d"), None);
        assert_eq!(node.name(), "Box (editconf)");
    }

    #[test]
    fn ports_are_derived_from_type_declaration() {
        let node = editconf();
        assert_eq!(node.inputs().count(), 1);
        assert_eq!(node.outputs().count(), 1);
        let out = node.port("out_gro").unwrap();
        assert_eq!(out.direction, PortDirection::Out);
        assert_eq!(out.property.as_deref(), Some("-o"));
        assert_eq!(out.owner, node.id());
    }

    #[test]
    fn set_value_reports_change_and_rejects_unmaterialized_flags() {
        let mut node = editconf();
        assert!(node.set_value("-box", "9").unwrap());
        assert!(!node.set_value("-box", "9").unwrap());
        assert!(matches!(
            node.set_value("-d", "1.2"),
            Err(GraphError::PropertyNotMaterialized { .. })
        ));
    }

    #[test]
    fn activating_optional_appends_property_once() {
        let registry = PortTypeRegistry::builtin().unwrap();
        let node_type = registry.spec_for("editconf").unwrap();
        let mut node = editconf();

        assert!(node.activate_optional(node_type, "-d").unwrap());
        assert!(!node.activate_optional(node_type, "-d").unwrap());
        assert_eq!(node.properties().len(), 5);
        assert_eq!(node.properties().keys().last().map(String::as_str), Some("-d"));
        assert_eq!(node.value("-d"), Some("1.0"));
        assert!(node.is_activated("-d"));

        assert!(matches!(
            node.activate_optional(node_type, "-nope"),
            Err(GraphError::UnknownOptionalProperty { .. })
        ));
    }
}
