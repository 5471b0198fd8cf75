//! `Embedder`: batch text → fixed-dimension vectors.

#[cfg(feature = "embeddings")]
mod fastembed_impl;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider failed: {0}")]
    EmbedFailed(String),
}

pub type EmbedResult<T> = Result<T, EmbedError>;

/// Default vector dimension.
pub const DEFAULT_DIMENSION: usize = 1536;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// The fixed dimension vectors produced by this embedder.
    fn dimension(&self) -> usize;

    /// Produce vectors in input order. Output length equals input length;
    /// each vector's length equals `dimension()`. Empty input → empty
    /// output. Failures are total: either every vector comes back, or the
    /// whole call fails with `EmbedFailed`.
    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>>;
}

/// Deterministic test/fallback embedder. Configured canned vectors by text,
/// or a hash-based projection for texts with no configured vector, so tests
/// get reproducible output without depending on call order.
pub struct MockEmbedder {
    dimension: usize,
    canned: Mutex<HashMap<String, Vec<f32>>>,
    fail_on: Mutex<Option<String>>,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            canned: Mutex::new(HashMap::new()),
            fail_on: Mutex::new(None),
        }
    }

    pub fn with_vector(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.canned.lock().unwrap().insert(text.into(), vector);
        self
    }

    pub fn failing_on(self, text: impl Into<String>) -> Self {
        *self.fail_on.lock().unwrap() = Some(text.into());
        self
    }

    fn hash_project(&self, text: &str) -> Vec<f32> {
        let mut hash: u64 = 1469598103934665603;
        for b in text.as_bytes() {
            hash ^= *b as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        let mut state = hash;
        let mut v = vec![0.0f32; self.dimension];
        for val in v.iter_mut() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *val = ((state >> 11) as f32 / (1u64 << 53) as f32 - 0.5) * 2.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(fail_text) = self.fail_on.lock().unwrap().as_ref() {
            if texts.iter().any(|t| t == fail_text) {
                return Err(EmbedError::EmbedFailed(format!(
                    "configured failure for {fail_text:?}"
                )));
            }
        }
        let canned = self.canned.lock().unwrap();
        Ok(texts
            .iter()
            .map(|t| canned.get(t).cloned().unwrap_or_else(|| self.hash_project(t)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_produces_empty_output() {
        let embedder = MockEmbedder::new(8);
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn output_length_matches_input_and_dimension() {
        let embedder = MockEmbedder::new(8);
        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 8));
    }

    #[tokio::test]
    async fn hash_projection_is_deterministic() {
        let embedder = MockEmbedder::new(8);
        let a = embedder.embed(&["same text".to_string()]).await.unwrap();
        let b = embedder.embed(&["same text".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn configured_failure_fails_the_whole_batch() {
        let embedder = MockEmbedder::new(4).failing_on("poison");
        let err = embedder
            .embed(&["ok".to_string(), "poison".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::EmbedFailed(_)));
    }
}
