//! Node type: a named concept within one user's subgraph.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Open-ended key→string metadata attached to a node.
///
/// `BTreeMap` rather than `HashMap` so serialization order is deterministic,
/// since properties round-trip through a JSON string at the storage boundary
/// and tests assert on that string.
pub type Properties = BTreeMap<String, String>;

/// Maximum number of property keys a node may carry.
pub const MAX_PROPERTY_KEYS: usize = 32;

/// Maximum length of a node name.
pub const MAX_NAME_LEN: usize = 256;

/// A concept extracted from text, unique within `(user_id, name)`.
///
/// The embedding vector is not carried on this struct: it lives in the
/// `VectorStore`, keyed by the same `(user_id, name)` pair, so that a node
/// can exist transiently without a vector while its embedding is retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub node_type: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub perspective: Option<String>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: String::new(),
            properties: Properties::new(),
            perspective: None,
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    pub fn with_perspective(mut self, perspective: impl Into<String>) -> Self {
        self.perspective = Some(perspective.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let node = Node::new("Quantum Computing")
            .with_type("STABLE_INTEREST")
            .with_perspective("curious")
            .with_property("frequency", "10");

        assert_eq!(node.name, "Quantum Computing");
        assert_eq!(node.node_type, "STABLE_INTEREST");
        assert_eq!(node.perspective.as_deref(), Some("curious"));
        assert_eq!(node.properties.get("frequency"), Some(&"10".to_string()));
    }

    #[test]
    fn default_node_has_empty_type_and_no_perspective() {
        let node = Node::new("Blockchain");
        assert_eq!(node.node_type, "");
        assert!(node.perspective.is_none());
        assert!(node.properties.is_empty());
    }
}
