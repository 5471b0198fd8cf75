//! `GraphDatabase`: typed node/edge CRUD and user lifecycle, scoped by `user_id`.

use async_trait::async_trait;
use thiserror::Error;

use crate::graph::{DirectedEdge, GraphSchema, Node, Relationship};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("user does not exist")]
    UserAbsent,
    #[error("backend unreachable after bounded retry")]
    ConnectFailed,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-level facade over the graph backend. A backend must enforce
/// `user_id` scoping at query time — never by post-filtering.
#[async_trait]
pub trait GraphDatabase: Send + Sync {
    /// Open connection, verify reachability with bounded retry. Idempotent —
    /// safe to call more than once.
    async fn initialize(&self) -> StorageResult<()>;

    /// Idempotent merge of the user root. Returns `true` if the user was
    /// newly created, `false` if it already existed.
    async fn create_user(&self, user_id: &str) -> StorageResult<bool>;

    async fn user_exists(&self, user_id: &str) -> StorageResult<bool>;

    /// Two-phase delete: detach-delete every node for `user_id`, then the
    /// user root. Atomic from the caller's view. Errors `UserAbsent` if the
    /// user does not exist.
    async fn delete_user(&self, user_id: &str) -> StorageResult<()>;

    /// Merge on `(user_id, name)`. Errors `UserAbsent` if the user does not exist.
    async fn create_nodes(&self, nodes: &[Node], user_id: &str) -> StorageResult<()>;

    async fn get_node(&self, name: &str, user_id: &str) -> StorageResult<Option<Node>>;

    async fn get_all_nodes(&self, user_id: &str) -> StorageResult<Vec<Node>>;

    async fn check_node_exists(
        &self,
        name: &str,
        node_type: &str,
        user_id: &str,
    ) -> StorageResult<bool>;

    /// Merge on the 4-tuple `(user_id, source, target, relation)`. Silently
    /// skips edges whose endpoints do not exist.
    async fn create_relationships(
        &self,
        rels: &[Relationship],
        user_id: &str,
    ) -> StorageResult<()>;

    /// Both incoming and outgoing edges touching `name`, direction-tagged.
    async fn get_node_relationships(
        &self,
        name: &str,
        user_id: &str,
    ) -> StorageResult<Vec<DirectedEdge>>;

    async fn get_all_relationships(&self, user_id: &str) -> StorageResult<Vec<Relationship>>;

    /// Full wipe. Tests only.
    async fn clean_graph(&self) -> StorageResult<()>;

    // --- Schema storage shares the graph backend's connection. ---

    async fn get_all_schemas(&self, user_id: &str) -> StorageResult<Vec<GraphSchema>>;

    /// Upsert on `(user_id, name)`. Returns an opaque schema id.
    async fn store_schema(&self, schema: &GraphSchema, user_id: &str) -> StorageResult<String>;
}
