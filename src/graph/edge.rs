//! Relationship (edge) type: a directed, labeled link between two nodes of one user.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A directed labeled edge. Identity is `(user_id, source, target, relation)` —
/// the `user_id` lives at the storage boundary, not on this struct, since a
/// `Relationship` only ever exists scoped to one user's subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl Relationship {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
        }
    }
}

/// Which side of a `Relationship` a given node occupies, returned by
/// `GraphDatabase::get_node_relationships` so callers can tell incoming
/// edges from outgoing ones without re-deriving it from `source`/`target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectedEdge {
    pub relationship: Relationship,
    pub direction: EdgeDirection,
}
