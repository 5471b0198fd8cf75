//! `Constructor`: the ingestion pipeline turning unstructured text into a
//! merged set of nodes and relationships. Ingestion for one user is
//! serialized through a per-user lock; different users proceed fully in
//! parallel, using a `DashMap` keyed by `user_id` so concurrent callers
//! touching different users never contend on the same lock.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::extract::{ExtractError, ExtractedNode, Extractor};
use crate::graph::Node;
use crate::ops::{GraphOps, GraphUpdate, OpsError};
use crate::retrieve::{filter_relationships_to_known_nodes, ContextRetriever, RetrieveError};
use crate::schema_registry::{SchemaRegistry, SchemaRegistryError};

/// Lower bound on the per-user lock map's capacity.
pub const MIN_LOCK_MAP_CAPACITY: usize = 10_000;

#[derive(Debug, Error)]
pub enum ConstructError {
    #[error("user does not exist")]
    UserAbsent,
    #[error("content is empty after preprocessing")]
    EmptyContent,
    #[error("extraction failed: {0}")]
    ExtractFailed(String),
    #[error("per-user ingestion lock contended")]
    IngestBusy,
    #[error("ops error: {0}")]
    Ops(String),
    #[error("retrieval error: {0}")]
    Retrieve(String),
    #[error("schema registry error: {0}")]
    Schema(String),
}

pub type ConstructResult<T> = Result<T, ConstructError>;

impl From<ExtractError> for ConstructError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::ExtractFailed(msg) => ConstructError::ExtractFailed(msg),
        }
    }
}

impl From<OpsError> for ConstructError {
    fn from(err: OpsError) -> Self {
        match err {
            OpsError::UserAbsent => ConstructError::UserAbsent,
            other => ConstructError::Ops(other.to_string()),
        }
    }
}

impl From<RetrieveError> for ConstructError {
    fn from(err: RetrieveError) -> Self {
        match err {
            RetrieveError::UserAbsent => ConstructError::UserAbsent,
            other => ConstructError::Retrieve(other.to_string()),
        }
    }
}

impl From<SchemaRegistryError> for ConstructError {
    fn from(err: SchemaRegistryError) -> Self {
        match err {
            SchemaRegistryError::UserAbsent => ConstructError::UserAbsent,
            other => ConstructError::Schema(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnstructuredData {
    pub title: Option<String>,
    pub content: String,
    pub metadata: Vec<(String, String)>,
}

impl UnstructuredData {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: content.into(),
            metadata: Vec::new(),
        }
    }

    fn preprocess(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(title) = &self.title {
            parts.push(title.clone());
        }
        parts.push(self.content.clone());
        for (k, v) in &self.metadata {
            parts.push(format!("{k}: {v}"));
        }
        parts.join("\n").trim().to_string()
    }
}

/// Bounded map of per-user ingestion locks. Eviction only ever removes an
/// uncontended entry (lock acquired via `try_lock` then dropped) so a user
/// mid-ingestion is never evicted out from under itself.
struct IngestLockMap {
    locks: dashmap::DashMap<String, Arc<AsyncMutex<()>>>,
    order: StdMutex<VecDeque<String>>,
    capacity: usize,
}

impl IngestLockMap {
    fn new(capacity: usize) -> Self {
        Self {
            locks: dashmap::DashMap::new(),
            order: StdMutex::new(VecDeque::new()),
            capacity: capacity.max(MIN_LOCK_MAP_CAPACITY),
        }
    }

    fn get_or_insert(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        if let Some(existing) = self.locks.get(user_id) {
            return existing.clone();
        }
        let lock = Arc::new(AsyncMutex::new(()));
        self.locks.insert(user_id.to_string(), lock.clone());
        self.order.lock().unwrap().push_back(user_id.to_string());
        self.evict_if_over_capacity();
        lock
    }

    fn evict_if_over_capacity(&self) {
        if self.locks.len() <= self.capacity {
            return;
        }
        let mut order = self.order.lock().unwrap();
        let mut scanned = 0;
        while self.locks.len() > self.capacity && scanned < order.len() {
            if let Some(candidate) = order.pop_front() {
                let uncontended = self
                    .locks
                    .get(&candidate)
                    .map(|entry| entry.try_lock().is_ok())
                    .unwrap_or(false);
                if uncontended {
                    self.locks.remove(&candidate);
                } else {
                    order.push_back(candidate);
                    scanned += 1;
                }
            }
        }
    }
}

pub struct Constructor {
    ops: Arc<GraphOps>,
    schemas: Arc<SchemaRegistry>,
    retriever: Arc<ContextRetriever>,
    extractor: Arc<dyn Extractor>,
    locks: IngestLockMap,
    lock_timeout: Duration,
    max_hops: usize,
}

impl Constructor {
    pub fn new(
        ops: Arc<GraphOps>,
        schemas: Arc<SchemaRegistry>,
        retriever: Arc<ContextRetriever>,
        extractor: Arc<dyn Extractor>,
        lock_timeout: Duration,
        max_hops: usize,
    ) -> Self {
        Self {
            ops,
            schemas,
            retriever,
            extractor,
            locks: IngestLockMap::new(MIN_LOCK_MAP_CAPACITY),
            lock_timeout,
            max_hops,
        }
    }

    pub async fn ingest(
        &self,
        data: &UnstructuredData,
        user_id: &str,
    ) -> ConstructResult<GraphUpdate> {
        let text = data.preprocess();
        if text.is_empty() {
            return Err(ConstructError::EmptyContent);
        }

        let lock = self.locks.get_or_insert(user_id);
        let _guard = tokio::time::timeout(self.lock_timeout, lock.lock())
            .await
            .map_err(|_| ConstructError::IngestBusy)?;

        let schema_context = self.schemas.build_schema_context(user_id).await?;

        let extracted_nodes = self.extractor.get_nodes(&text, &schema_context).await?;
        if extracted_nodes.is_empty() {
            return Ok(GraphUpdate {
                nodes: Vec::new(),
                relationships: Vec::new(),
            });
        }

        let seed_names: Vec<String> = extracted_nodes.iter().map(|n| n.name.clone()).collect();
        let graph_context = self
            .retriever
            .get_relevant_graph_context(&seed_names, user_id, self.max_hops)
            .await?;

        let relationships = self
            .extractor
            .get_relationships(&extracted_nodes, &schema_context, &graph_context)
            .await?;

        let known_names: HashSet<String> = seed_names.iter().cloned().collect();
        let relationships = filter_relationships_to_known_nodes(relationships, &known_names);

        let nodes: Vec<Node> = extracted_nodes.into_iter().map(to_node).collect();
        let update = GraphUpdate {
            nodes,
            relationships,
        };
        self.ops.update_graph(&update, user_id).await?;
        Ok(update)
    }
}

fn to_node(extracted: ExtractedNode) -> Node {
    let mut node = Node::new(extracted.name);
    if let Some(node_type) = extracted.node_type {
        node = node.with_type(node_type);
    }
    if let Some(perspective) = extracted.perspective {
        node = node.with_perspective(perspective);
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::MockEmbedder;
    use crate::extract::MockExtractor;
    use crate::graph::Relationship;
    use crate::storage::{GraphDatabase, SqliteGraphDatabase};
    use crate::vector::{InMemoryVectorStore, VectorStore};

    async fn harness(extractor: MockExtractor) -> Constructor {
        let db: Arc<dyn GraphDatabase> = Arc::new(SqliteGraphDatabase::open_in_memory().unwrap());
        db.initialize().await.unwrap();
        db.create_user("alice").await.unwrap();
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(8));
        let embedder: Arc<dyn crate::embed::Embedder> = Arc::new(MockEmbedder::new(8));
        let ops = Arc::new(GraphOps::new(db.clone(), vectors, embedder));
        let schemas = Arc::new(SchemaRegistry::new(db));
        schemas.ensure_seed_schemas("alice").await.unwrap();
        let retriever = Arc::new(ContextRetriever::new(ops.clone()));
        Constructor::new(
            ops,
            schemas,
            retriever,
            Arc::new(extractor),
            Duration::from_secs(1),
            2,
        )
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let constructor = harness(MockExtractor::new()).await;
        let data = UnstructuredData::new("   ");
        let err = constructor.ingest(&data, "alice").await.unwrap_err();
        assert!(matches!(err, ConstructError::EmptyContent));
    }

    #[tokio::test]
    async fn relationships_referencing_unknown_nodes_are_dropped() {
        let extractor = MockExtractor::new()
            .with_nodes(
                "Alice works on FocusFlow",
                vec![ExtractedNode::new("Alice"), ExtractedNode::new("FocusFlow")],
            )
            .with_relationships(
                "",
                vec![
                    Relationship::new("Alice", "FocusFlow", "WORKS_ON"),
                    Relationship::new("Alice", "Ghost", "KNOWS"),
                ],
            );
        let constructor = harness(extractor).await;
        let data = UnstructuredData::new("Alice works on FocusFlow");
        let update = constructor.ingest(&data, "alice").await.unwrap();
        assert_eq!(update.relationships.len(), 1);
        assert_eq!(update.relationships[0].target, "FocusFlow");
    }

    #[tokio::test]
    async fn reingesting_identical_text_does_not_duplicate_nodes() {
        let extractor = MockExtractor::new()
            .with_nodes("same text", vec![ExtractedNode::new("Thing")]);
        let constructor = harness(extractor).await;
        let data = UnstructuredData::new("same text");
        constructor.ingest(&data, "alice").await.unwrap();
        constructor.ingest(&data, "alice").await.unwrap();
        let nodes = constructor.ops.get_all_nodes("alice").await.unwrap();
        assert_eq!(nodes.len(), 1);
    }
}
