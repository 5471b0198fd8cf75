//! `InMemoryVectorStore` — fallback/test `VectorStore`, a linear cosine-similarity
//! scan over a `RwLock<HashMap<user_id, HashMap<node_name, Vec<f32>>>>`.
//!
//! Functionally equivalent to `SqliteVecStore`, not performance-equivalent;
//! used whenever the `embeddings` feature is off, and in tests regardless.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::traits::{clamp_k, SimilarityHit, VectorError, VectorResult, VectorStore};

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub struct InMemoryVectorStore {
    dimension: usize,
    vectors: RwLock<HashMap<String, HashMap<String, Vec<f32>>>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self) -> VectorResult<()> {
        Ok(())
    }

    async fn add_embedding(
        &self,
        node_name: &str,
        vector: Vec<f32>,
        user_id: &str,
    ) -> VectorResult<()> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let mut store = self.vectors.write().unwrap();
        store
            .entry(user_id.to_string())
            .or_default()
            .insert(node_name.to_string(), vector);
        Ok(())
    }

    async fn has(&self, node_name: &str, user_id: &str) -> VectorResult<bool> {
        let store = self.vectors.read().unwrap();
        Ok(store
            .get(user_id)
            .map(|user_vectors| user_vectors.contains_key(node_name))
            .unwrap_or(false))
    }

    async fn search_similar(
        &self,
        vector: &[f32],
        user_id: &str,
        k: usize,
    ) -> VectorResult<Vec<SimilarityHit>> {
        let k = clamp_k(k);
        if k == 0 {
            return Ok(Vec::new());
        }
        let store = self.vectors.read().unwrap();
        let Some(user_vectors) = store.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<SimilarityHit> = user_vectors
            .iter()
            .map(|(name, candidate)| SimilarityHit {
                node_name: name.clone(),
                score: cosine_similarity(vector, candidate),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node_name.cmp(&b.node_name))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_user(&self, user_id: &str) -> VectorResult<()> {
        self.vectors.write().unwrap().remove(user_id);
        Ok(())
    }

    async fn drop_index(&self) -> VectorResult<()> {
        self.vectors.write().unwrap().clear();
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_embedding_rejects_dimension_mismatch() {
        let store = InMemoryVectorStore::new(3);
        let err = store
            .add_embedding("n", vec![1.0, 0.0], "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn search_similar_never_crosses_user_boundary() {
        let store = InMemoryVectorStore::new(3);
        store
            .add_embedding("dogs", vec![1.0, 0.0, 0.0], "u1")
            .await
            .unwrap();
        store
            .add_embedding("cats", vec![0.0, 1.0, 0.0], "u2")
            .await
            .unwrap();

        let hits = store.search_similar(&[0.0, 1.0, 0.0], "u1", 5).await.unwrap();
        assert!(hits.iter().all(|h| h.node_name != "cats"));
    }

    #[tokio::test]
    async fn k_zero_returns_empty_without_error() {
        let store = InMemoryVectorStore::new(3);
        store
            .add_embedding("n", vec![1.0, 0.0, 0.0], "u1")
            .await
            .unwrap();
        let hits = store.search_similar(&[1.0, 0.0, 0.0], "u1", 0).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn k_above_max_is_clamped() {
        let store = InMemoryVectorStore::new(2);
        for i in 0..5 {
            store
                .add_embedding(&format!("n{i}"), vec![1.0, i as f32], "u1")
                .await
                .unwrap();
        }
        let hits = store
            .search_similar(&[1.0, 0.0], "u1", 100_000)
            .await
            .unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[tokio::test]
    async fn delete_user_removes_only_that_users_vectors() {
        let store = InMemoryVectorStore::new(3);
        store.add_embedding("n", vec![1.0, 0.0, 0.0], "u1").await.unwrap();
        store.add_embedding("n", vec![0.0, 1.0, 0.0], "u2").await.unwrap();
        store.delete_user("u1").await.unwrap();
        assert!(!store.has("n", "u1").await.unwrap());
        assert!(store.has("n", "u2").await.unwrap());
    }

    #[tokio::test]
    async fn drop_index_clears_all_users() {
        let store = InMemoryVectorStore::new(2);
        store.add_embedding("n", vec![1.0, 0.0], "u1").await.unwrap();
        store.drop_index().await.unwrap();
        assert!(!store.has("n", "u1").await.unwrap());
    }
}
