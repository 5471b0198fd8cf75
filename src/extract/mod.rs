//! `Extractor`: schema-guided text → nodes + relationships.

#[cfg(feature = "real_llm")]
mod subprocess;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "real_llm")]
pub use subprocess::SubprocessExtractor;

use crate::graph::Relationship;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extractor provider failed: {0}")]
    ExtractFailed(String),
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// A node as produced by the extractor, before it is merged into storage.
/// `node_type` lets the extractor choose a type per node from the schema
/// context it was given, for schema-guided typing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedNode {
    pub name: String,
    pub node_type: Option<String>,
    pub perspective: Option<String>,
}

impl ExtractedNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: None,
            perspective: None,
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_perspective(mut self, perspective: impl Into<String>) -> Self {
        self.perspective = Some(perspective.into());
        self
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn get_nodes(
        &self,
        text: &str,
        schema_context: &str,
    ) -> ExtractResult<Vec<ExtractedNode>>;

    /// The caller owns filtering: relationships referencing names outside
    /// `nodes` are the caller's responsibility to drop, not this trait's.
    async fn get_relationships(
        &self,
        nodes: &[ExtractedNode],
        schema_context: &str,
        graph_context: &str,
    ) -> ExtractResult<Vec<Relationship>>;
}

/// Programmable canned-response extractor for deterministic tests: responses
/// keyed by the input text, with an optional configured failure.
#[derive(Default)]
pub struct MockExtractor {
    node_responses: Mutex<HashMap<String, Vec<ExtractedNode>>>,
    relationship_responses: Mutex<HashMap<String, Vec<Relationship>>>,
    fail_nodes_on: Mutex<Option<String>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(self, text: impl Into<String>, nodes: Vec<ExtractedNode>) -> Self {
        self.node_responses.lock().unwrap().insert(text.into(), nodes);
        self
    }

    pub fn with_relationships(
        self,
        text_key: impl Into<String>,
        rels: Vec<Relationship>,
    ) -> Self {
        self.relationship_responses
            .lock()
            .unwrap()
            .insert(text_key.into(), rels);
        self
    }

    pub fn failing_nodes_on(self, text: impl Into<String>) -> Self {
        *self.fail_nodes_on.lock().unwrap() = Some(text.into());
        self
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn get_nodes(
        &self,
        text: &str,
        _schema_context: &str,
    ) -> ExtractResult<Vec<ExtractedNode>> {
        if self.fail_nodes_on.lock().unwrap().as_deref() == Some(text) {
            return Err(ExtractError::ExtractFailed(format!(
                "configured failure for {text:?}"
            )));
        }
        Ok(self
            .node_responses
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_relationships(
        &self,
        _nodes: &[ExtractedNode],
        _schema_context: &str,
        graph_context: &str,
    ) -> ExtractResult<Vec<Relationship>> {
        Ok(self
            .relationship_responses
            .lock()
            .unwrap()
            .get(graph_context)
            .cloned()
            .unwrap_or_default())
    }
}
