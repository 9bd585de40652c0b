use crate::core::models::port::DataKind;
use crate::core::models::property::{MENU_SELECTOR_KEY, Property, PropertyKind};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// The GROMACS node catalogue compiled into the library.
const BUILTIN_CATALOGUE: &str = include_str!("../../data/node_types.toml");

/// Declaration of one property a node type carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub label: String,
    pub kind: PropertyKind,
    /// Literal default for text properties, first choice for combos.
    pub default: String,
    /// Template line an activated optional property is appended to.
    pub line: usize,
}

impl PropertySpec {
    /// Materializes a fresh property holding the default value.
    pub fn instantiate(&self) -> Property {
        Property {
            label: self.label.clone(),
            kind: self.kind.clone(),
            value: self.default.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPortSpec {
    pub kind: DataKind,
    pub property: Option<String>,
    pub accepts: Vec<DataKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPortSpec {
    pub kind: DataKind,
    pub property: Option<String>,
}

/// The command a node type compiles to: a single line, or an ordered list of
/// lines for composite steps (e.g. `grompp` followed by `mdrun`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandTemplate {
    Single(String),
    Sequence(Vec<String>),
}

impl CommandTemplate {
    pub fn lines(&self) -> &[String] {
        match self {
            CommandTemplate::Single(line) => std::slice::from_ref(line),
            CommandTemplate::Sequence(lines) => lines,
        }
    }
}

/// Static description of one kind of processing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeType {
    pub type_id: String,
    pub display_name: String,
    /// Invocation prefix used by the flag-pair preview (`gmx <type-id>` unless overridden).
    pub tool: String,
    pub base_properties: IndexMap<String, PropertySpec>,
    pub optional_properties: IndexMap<String, PropertySpec>,
    pub inputs: IndexMap<String, InputPortSpec>,
    pub outputs: IndexMap<String, OutputPortSpec>,
    pub command: CommandTemplate,
}

impl NodeType {
    /// Looks a flag up among base properties first, then optional ones.
    pub fn property_spec(&self, flag: &str) -> Option<&PropertySpec> {
        self.base_properties
            .get(flag)
            .or_else(|| self.optional_properties.get(flag))
    }

    pub fn is_optional(&self, flag: &str) -> bool {
        self.optional_properties.contains_key(flag)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalogue {
    #[serde(default)]
    node: Vec<RawNodeType>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawNodeType {
    type_id: String,
    display_name: String,
    tool: Option<String>,
    command: CommandTemplate,
    #[serde(default)]
    property: Vec<RawPropertySpec>,
    #[serde(default)]
    optional: Vec<RawPropertySpec>,
    #[serde(default)]
    input: Vec<RawPortSpec>,
    #[serde(default)]
    output: Vec<RawPortSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPropertySpec {
    flag: String,
    label: String,
    default: Option<String>,
    choices: Option<Vec<String>>,
    line: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPortSpec {
    name: String,
    kind: DataKind,
    property: Option<String>,
    accepts: Option<Vec<DataKind>>,
}

/// Read-only lookup table of every known node type, keyed by type id.
///
/// Populated once at startup, either from the built-in catalogue or from a
/// user TOML file with the same schema, and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct PortTypeRegistry {
    types: IndexMap<String, NodeType>,
}

impl PortTypeRegistry {
    /// Loads the catalogue shipped with the library.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUILTIN_CATALOGUE, "<builtin>")
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content, &path.to_string_lossy())
    }

    /// Parses and validates a catalogue. `origin` only labels error messages.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, RegistryError> {
        let raw: RawCatalogue = toml::from_str(content).map_err(|e| RegistryError::Toml {
            path: origin.to_string(),
            source: e,
        })?;

        let mut registry = Self::default();
        for raw_type in raw.node {
            let node_type = validate(raw_type)?;
            registry.insert(node_type)?;
        }
        debug!("Loaded {} node type(s) from {}", registry.len(), origin);
        Ok(registry)
    }

    /// Adds every type of `other`, refusing ids that are already registered.
    pub fn extend(&mut self, other: PortTypeRegistry) -> Result<(), RegistryError> {
        for (_, node_type) in other.types {
            self.insert(node_type)?;
        }
        Ok(())
    }

    fn insert(&mut self, node_type: NodeType) -> Result<(), RegistryError> {
        if self.types.contains_key(&node_type.type_id) {
            return Err(RegistryError::DuplicateType(node_type.type_id));
        }
        self.types.insert(node_type.type_id.clone(), node_type);
        Ok(())
    }

    pub fn spec_for(&self, type_id: &str) -> Result<&NodeType, RegistryError> {
        self.types
            .get(type_id)
            .ok_or_else(|| RegistryError::UnknownType(type_id.to_string()))
    }

    pub fn get(&self, type_id: &str) -> Option<&NodeType> {
        self.types.get(type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn validate(raw: RawNodeType) -> Result<NodeType, RegistryError> {
    let type_id = raw.type_id;
    let invalid = |message: String| RegistryError::InvalidDefinition {
        type_id: type_id.clone(),
        message,
    };

    if raw.command.lines().is_empty() || raw.command.lines().iter().any(|l| l.trim().is_empty()) {
        return Err(invalid("command template is empty".to_string()));
    }

    let mut base_properties = IndexMap::new();
    let mut optional_properties = IndexMap::new();
    for (raw_spec, optional) in raw
        .property
        .into_iter()
        .map(|p| (p, false))
        .chain(raw.optional.into_iter().map(|p| (p, true)))
    {
        if raw_spec.flag == MENU_SELECTOR_KEY {
            return Err(invalid(format!("'{}' is a reserved property name", raw_spec.flag)));
        }
        if base_properties.contains_key(&raw_spec.flag)
            || optional_properties.contains_key(&raw_spec.flag)
        {
            return Err(invalid(format!("property '{}' is declared twice", raw_spec.flag)));
        }
        let line = raw_spec.line.unwrap_or(0);
        if line >= raw.command.lines().len() {
            return Err(invalid(format!(
                "property '{}' targets template line {} but the template has {}",
                raw_spec.flag,
                line,
                raw.command.lines().len()
            )));
        }
        if !optional && raw_spec.line.is_some() {
            return Err(invalid(format!(
                "base property '{}' cannot declare a template line",
                raw_spec.flag
            )));
        }
        let spec = match (raw_spec.default, raw_spec.choices) {
            (None, Some(choices)) => {
                let Some(first) = choices.first().cloned() else {
                    return Err(invalid(format!("combo '{}' has no choices", raw_spec.flag)));
                };
                PropertySpec {
                    label: raw_spec.label,
                    kind: PropertyKind::Choice(choices),
                    default: first,
                    line,
                }
            }
            (default, None) => PropertySpec {
                label: raw_spec.label,
                kind: PropertyKind::Text,
                default: default.unwrap_or_default(),
                line,
            },
            (Some(_), Some(_)) => {
                return Err(invalid(format!(
                    "property '{}' declares both a default and choices",
                    raw_spec.flag
                )));
            }
        };
        if optional {
            optional_properties.insert(raw_spec.flag, spec);
        } else {
            base_properties.insert(raw_spec.flag, spec);
        }
    }

    let known_property =
        |flag: &str| base_properties.contains_key(flag) || optional_properties.contains_key(flag);

    let mut port_names = HashSet::new();
    let mut inputs = IndexMap::new();
    for port in raw.input {
        if !port_names.insert(port.name.clone()) {
            return Err(invalid(format!("port '{}' is declared twice", port.name)));
        }
        if let Some(property) = port.property.as_deref() {
            if !known_property(property) {
                return Err(invalid(format!(
                    "input port '{}' maps unknown property '{}'",
                    port.name, property
                )));
            }
        }
        let accepts = port.accepts.unwrap_or_else(|| vec![port.kind.clone()]);
        inputs.insert(
            port.name,
            InputPortSpec {
                kind: port.kind,
                property: port.property,
                accepts,
            },
        );
    }

    let mut outputs = IndexMap::new();
    for port in raw.output {
        if !port_names.insert(port.name.clone()) {
            return Err(invalid(format!("port '{}' is declared twice", port.name)));
        }
        if port.accepts.is_some() {
            return Err(invalid(format!(
                "output port '{}' cannot declare accepted kinds",
                port.name
            )));
        }
        if let Some(property) = port.property.as_deref() {
            if !known_property(property) {
                return Err(invalid(format!(
                    "output port '{}' maps unknown property '{}'",
                    port.name, property
                )));
            }
        }
        outputs.insert(
            port.name,
            OutputPortSpec {
                kind: port.kind,
                property: port.property,
            },
        );
    }

    let tool = raw.tool.unwrap_or_else(|| format!("gmx {}", type_id));

    Ok(NodeType {
        display_name: raw.display_name,
        tool,
        base_properties,
        optional_properties,
        inputs,
        outputs,
        command: raw.command,
        type_id,
    })
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown node type '{0}'")]
    UnknownType(String),
    #[error("Node type '{0}' is registered twice")]
    DuplicateType(String),
    #[error("Invalid definition for node type '{type_id}': {message}")]
    InvalidDefinition { type_id: String, message: String },
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}
