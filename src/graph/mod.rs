//! Core data model: `Node`, `Relationship`, `GraphSchema`, user-id validation.

mod edge;
mod node;
mod schema;
mod user;

pub use edge::{DirectedEdge, EdgeDirection, Relationship};
pub use node::{Node, Properties, MAX_NAME_LEN, MAX_PROPERTY_KEYS};
pub use schema::{render_schema_context, seed_schemas, GraphSchema, CORE_PSYCHOLOGY_SCHEMA_NAME};
pub use user::validate_user_id;
