/// Transient key written by the "add a property" menu. Never compiled, never persisted.
pub const MENU_SELECTOR_KEY: &str = "add_property";

/// Widget shape of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    /// Enumerated choices; the first one is the default.
    Choice(Vec<String>),
}

/// A materialized property on a node instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub label: String,
    pub kind: PropertyKind,
    pub value: String,
}

impl Property {
    /// Returns `true` when the value is one of the declared choices (always for text).
    pub fn is_valid_choice(&self) -> bool {
        match &self.kind {
            PropertyKind::Text => true,
            PropertyKind::Choice(choices) => choices.iter().any(|c| c == &self.value),
        }
    }
}
