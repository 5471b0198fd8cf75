//! GraphSchema: a named set of allowed node types and relation labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub name: String,
    pub description: String,
    pub attributes: Vec<String>,
    pub relationships: Vec<String>,
    pub is_seed: bool,
    pub created_at: DateTime<Utc>,
}

impl GraphSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            is_seed: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_attributes(mut self, attrs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.attributes = attrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_relationships(mut self, rels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.relationships = rels.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_seed(mut self) -> Self {
        self.is_seed = true;
        self
    }
}

/// Name of the schema that must be seeded on first use of a user.
pub const CORE_PSYCHOLOGY_SCHEMA_NAME: &str = "Core Psychology";

/// The declared set of seed schemas: a fixed psychological-trait taxonomy
/// every new user starts with, keyed by its attribute and relationship
/// vocabulary rather than any particular domain.
pub fn seed_schemas() -> Vec<GraphSchema> {
    vec![GraphSchema::new(
        CORE_PSYCHOLOGY_SCHEMA_NAME,
        "Basic psychological traits and interests schema",
    )
    .with_attributes([
        "CORE_PSYCHE",
        "STABLE_INTEREST",
        "TEMPORAL_INTEREST",
        "ACTIVE_INTEREST",
    ])
    .with_relationships(["PART_OF", "RELATES_TO", "LEADS_TO", "INFLUENCED_BY", "SIMILAR_TO"])
    .as_seed()]
}

/// Render the deterministic schema-context string the `Constructor` passes
/// to the `Extractor`: schemas sorted by name, attributes/relationships in
/// declaration order.
pub fn render_schema_context(schemas: &[GraphSchema]) -> String {
    let mut sorted: Vec<&GraphSchema> = schemas.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out = String::new();
    for schema in sorted {
        out.push_str(&format!("## Schema: {}\n", schema.name));
        out.push_str(&format!("Description: {}\n\n", schema.description));
        out.push_str("### Attributes\n");
        for attr in &schema.attributes {
            out.push_str(&format!("- {attr}\n"));
        }
        out.push_str("\n### Relationships\n");
        for rel in &schema.relationships {
            out.push_str(&format!("- {rel}\n"));
        }
        out.push_str("\n---\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_schema_carries_declared_attributes_and_relationships() {
        let schemas = seed_schemas();
        assert_eq!(schemas.len(), 1);
        let schema = &schemas[0];
        assert_eq!(schema.name, CORE_PSYCHOLOGY_SCHEMA_NAME);
        assert!(schema.is_seed);
        assert_eq!(schema.attributes.len(), 4);
        assert_eq!(schema.relationships.len(), 5);
    }

    #[test]
    fn render_schema_context_sorts_by_name_and_is_stable() {
        let schemas = vec![
            GraphSchema::new("Zeta", "z desc").with_attributes(["Z1"]),
            GraphSchema::new("Alpha", "a desc").with_attributes(["A1", "A2"]),
        ];
        let rendered = render_schema_context(&schemas);
        let alpha_pos = rendered.find("## Schema: Alpha").unwrap();
        let zeta_pos = rendered.find("## Schema: Zeta").unwrap();
        assert!(alpha_pos < zeta_pos);
        assert!(rendered.contains("- A1\n- A2\n"));
    }

    #[test]
    fn render_empty_schema_context_extracts_zero_nodes_worth_of_structure() {
        assert_eq!(render_schema_context(&[]), "");
    }
}
