//! Noema: per-user personal knowledge graph service.
//!
//! A per-user isolated subgraph store with schema-guided entity/relationship
//! extraction, a vector embedding index, and RAG retrieval that fuses vector
//! similarity with bounded graph traversal.
//!
//! # Core Concepts
//!
//! - **User subgraph**: every node, relationship, and schema is scoped to
//!   exactly one `user_id`; isolation is enforced at the storage query
//!   level, never by post-filtering.
//! - **Schema-guided extraction**: an `Extractor` turns unstructured text
//!   into nodes and relationships using the schema context currently
//!   installed for that user.
//! - **RAG retrieval**: similarity search seeds a bounded BFS over the
//!   user's graph; the resulting context feeds a `Generator`.

pub mod config;
pub mod construct;
pub mod embed;
pub mod error;
pub mod extract;
pub mod generate;
pub mod graph;
pub mod mcp;
pub mod ops;
pub mod rag;
pub mod retrieve;
pub mod schema_registry;
pub mod storage;
pub mod user_service;
pub mod vector;

pub use config::Config;
pub use error::{NoemaError, NoemaResult};

/// Library version, reported by the `/version` tool.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
