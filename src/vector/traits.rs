//! `VectorStore`: per-user embedding index with cosine kNN.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("vector length {actual} does not match configured dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("no node exists for this name in this user's subgraph")]
    NodeAbsent,
    #[error("vector index already exists with an incompatible configuration")]
    ConflictingSchema,
    #[error("vector backend error: {0}")]
    Backend(String),
}

pub type VectorResult<T> = Result<T, VectorError>;

/// Maximum bound on `k` for `search_similar`.
pub const MAX_K: usize = 200;

/// Clamp a caller-supplied `k` into `[0, MAX_K]` — this reference
/// implementation clamps rather than rejects out-of-range values.
pub fn clamp_k(k: usize) -> usize {
    k.min(MAX_K)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub node_name: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ensure a single named index exists with the configured dimension and
    /// cosine similarity. Idempotent.
    async fn initialize(&self) -> VectorResult<()>;

    /// Upsert the embedding for `(user_id, node_name)`.
    async fn add_embedding(
        &self,
        node_name: &str,
        vector: Vec<f32>,
        user_id: &str,
    ) -> VectorResult<()>;

    /// Whether an embedding is present for `(user_id, node_name)`.
    async fn has(&self, node_name: &str, user_id: &str) -> VectorResult<bool>;

    /// Top-`k` nodes belonging to `user_id`, descending cosine similarity.
    /// Never returns hits belonging to another user. `k` is clamped to
    /// `[0, MAX_K]`.
    async fn search_similar(
        &self,
        vector: &[f32],
        user_id: &str,
        k: usize,
    ) -> VectorResult<Vec<SimilarityHit>>;

    /// Remove every vector owned by `user_id`.
    async fn delete_user(&self, user_id: &str) -> VectorResult<()>;

    /// Full wipe. Tests only.
    async fn drop_index(&self) -> VectorResult<()>;

    /// The fixed dimension this store was configured with.
    fn dimension(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_k_caps_above_max_and_passes_through_below() {
        assert_eq!(clamp_k(0), 0);
        assert_eq!(clamp_k(5), 5);
        assert_eq!(clamp_k(200), 200);
        assert_eq!(clamp_k(10_000), MAX_K);
    }
}
