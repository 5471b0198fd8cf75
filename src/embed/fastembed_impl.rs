//! `FastEmbedEmbedder` — local ONNX embedding model via `fastembed`.
//!
//! `fastembed::TextEmbedding::embed` takes `&mut self`, so the model is
//! wrapped in a `Mutex` to satisfy the `Send + Sync` `Embedder` trait.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use super::{EmbedError, EmbedResult, Embedder};

pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
    dimension: usize,
}

impl FastEmbedEmbedder {
    pub fn new(dimension: usize) -> EmbedResult<Self> {
        Self::with_model(EmbeddingModel::NomicEmbedTextV15, dimension)
    }

    pub fn with_model(model: EmbeddingModel, dimension: usize) -> EmbedResult<Self> {
        let text_embedding = TextEmbedding::try_new(InitOptions::new(model))
            .map_err(|e| EmbedError::EmbedFailed(e.to_string()))?;
        Ok(Self {
            model: Mutex::new(text_embedding),
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for FastEmbedEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self.model.lock().await;
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        model
            .embed(refs, None)
            .map_err(|e| EmbedError::EmbedFailed(e.to_string()))
    }
}
