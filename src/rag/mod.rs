//! `RagInterface`, `AskService`, and `CustomDataService`: the three
//! generator-facing surfaces over `GraphOps`/`ContextRetriever`. Grouped
//! into one module since each is a thin composition with no state of its
//! own beyond its collaborators.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::generate::{GenerateError, Generator};
use crate::graph::{Node, Relationship};
use crate::ops::{GraphOps, GraphUpdate, OpsError};
use crate::retrieve::{ContextRetriever, RetrieveError};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("user does not exist")]
    UserAbsent,
    #[error("generation failed: {0}")]
    GenerateFailed(String),
    #[error("ops error: {0}")]
    Ops(String),
    #[error("retrieval error: {0}")]
    Retrieve(String),
}

pub type RagResult<T> = Result<T, RagError>;

impl From<OpsError> for RagError {
    fn from(err: OpsError) -> Self {
        match err {
            OpsError::UserAbsent => RagError::UserAbsent,
            other => RagError::Ops(other.to_string()),
        }
    }
}

impl From<RetrieveError> for RagError {
    fn from(err: RetrieveError) -> Self {
        match err {
            RetrieveError::UserAbsent => RagError::UserAbsent,
            other => RagError::Retrieve(other.to_string()),
        }
    }
}

impl From<GenerateError> for RagError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::GenerateFailed(msg) => RagError::GenerateFailed(msg),
        }
    }
}

pub struct RagInterface {
    ops: Arc<GraphOps>,
    retriever: Arc<ContextRetriever>,
    generator: Arc<dyn Generator>,
    default_top_k: usize,
    default_max_hops: usize,
}

impl RagInterface {
    pub fn new(
        ops: Arc<GraphOps>,
        retriever: Arc<ContextRetriever>,
        generator: Arc<dyn Generator>,
        default_top_k: usize,
        default_max_hops: usize,
    ) -> Self {
        Self {
            ops,
            retriever,
            generator,
            default_top_k,
            default_max_hops,
        }
    }

    pub async fn get_context(&self, query: &str, user_id: &str) -> RagResult<String> {
        Ok(self
            .retriever
            .get_rich_context(query, user_id, self.default_max_hops, self.default_top_k)
            .await?)
    }

    pub async fn query(&self, query: &str, user_id: &str) -> RagResult<String> {
        let context = self.get_context(query, user_id).await?;
        Ok(self.generator.generate(query, &context).await?)
    }

    /// Ablation path: skips neighborhood expansion, feeding the generator
    /// only the top-k node-name list from similarity search.
    pub async fn query_vector_only(&self, query: &str, user_id: &str) -> RagResult<String> {
        let search = self
            .ops
            .text_similarity_search(query, user_id, self.default_top_k)
            .await?;
        let names: Vec<String> = search.results.into_iter().map(|hit| hit.node_name).collect();
        let context = names.join(", ");
        Ok(self.generator.generate(query, &context).await?)
    }
}

pub struct AskService {
    rag: Arc<RagInterface>,
    generator: Arc<dyn Generator>,
}

impl AskService {
    pub fn new(rag: Arc<RagInterface>, generator: Arc<dyn Generator>) -> Self {
        Self { rag, generator }
    }

    /// Fetches rich context, then asks the generator for a structured
    /// answer conforming to `output_schema`. `output_schema`'s shape is the
    /// generator's contract, not validated here.
    pub async fn ask(
        &self,
        user_id: &str,
        query: &str,
        output_schema: &Value,
    ) -> RagResult<Value> {
        let context = self.rag.get_context(query, user_id).await?;
        Ok(self
            .generator
            .generate_structured(output_schema, query, &context)
            .await?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomDataRequest {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomDataResponse {
    pub accepted_nodes: usize,
    pub accepted_relationships: usize,
}

pub struct CustomDataService {
    ops: Arc<GraphOps>,
}

impl CustomDataService {
    pub fn new(ops: Arc<GraphOps>) -> Self {
        Self { ops }
    }

    /// Writes caller-supplied nodes/relationships directly, bypassing the
    /// extractor. The same `GraphOps.update_graph` merge path extractor- and
    /// custom-sourced data both go through — there is exactly one.
    pub async fn update_custom_data(
        &self,
        user_id: &str,
        request: CustomDataRequest,
    ) -> RagResult<CustomDataResponse> {
        let accepted_nodes = request.nodes.len();
        let accepted_relationships = request.relationships.len();
        let update = GraphUpdate {
            nodes: request.nodes,
            relationships: request.relationships,
        };
        self.ops.update_graph(&update, user_id).await?;
        Ok(CustomDataResponse {
            accepted_nodes,
            accepted_relationships,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::MockEmbedder;
    use crate::generate::MockGenerator;
    use crate::storage::{GraphDatabase, SqliteGraphDatabase};
    use crate::vector::{InMemoryVectorStore, VectorStore};

    async fn harness() -> (RagInterface, Arc<GraphOps>) {
        let db: Arc<dyn GraphDatabase> = Arc::new(SqliteGraphDatabase::open_in_memory().unwrap());
        db.initialize().await.unwrap();
        db.create_user("alice").await.unwrap();
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(8));
        let embedder: Arc<dyn crate::embed::Embedder> = Arc::new(MockEmbedder::new(8));
        let ops = Arc::new(GraphOps::new(db, vectors, embedder));
        let retriever = Arc::new(ContextRetriever::new(ops.clone()));
        let generator: Arc<dyn Generator> = Arc::new(MockGenerator::new().with_response("hi", "hello back"));
        (
            RagInterface::new(ops.clone(), retriever, generator, 5, 2),
            ops,
        )
    }

    #[tokio::test]
    async fn query_returns_generator_answer() {
        let (rag, _ops) = harness().await;
        let answer = rag.query("hi", "alice").await.unwrap();
        assert_eq!(answer, "hello back");
    }

    #[tokio::test]
    async fn custom_data_bypasses_extractor_and_merges_directly() {
        let (_, ops) = harness().await;
        let service = CustomDataService::new(ops.clone());
        let response = service
            .update_custom_data(
                "alice",
                CustomDataRequest {
                    nodes: vec![Node::new("Alice"), Node::new("FocusFlow")],
                    relationships: vec![Relationship::new("Alice", "FocusFlow", "WORKS_ON")],
                },
            )
            .await
            .unwrap();
        assert_eq!(response.accepted_nodes, 2);
        assert_eq!(response.accepted_relationships, 1);
        assert_eq!(ops.get_all_nodes("alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ask_returns_structured_value_from_generator() {
        let (rag, _ops) = harness().await;
        let generator: Arc<dyn Generator> = Arc::new(
            MockGenerator::new().with_structured_response("who?", serde_json::json!({"name": "Alice"})),
        );
        let ask = AskService::new(Arc::new(rag), generator);
        let result = ask
            .ask("alice", "who?", &serde_json::json!({"type": "object"}))
            .await
            .unwrap();
        assert_eq!(result["name"], "Alice");
    }
}
