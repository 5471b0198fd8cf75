//! End-to-end scenarios from the testable-properties section: user
//! lifecycle, idempotent ingestion, cross-user isolation, empty-content
//! rejection, cascade deletion, and schema-guided typing.

use std::sync::Arc;
use std::time::Duration;

use noema::construct::{Constructor, ConstructError, UnstructuredData};
use noema::embed::{Embedder, MockEmbedder};
use noema::extract::{ExtractedNode, MockExtractor};
use noema::graph::{GraphSchema, Relationship};
use noema::ops::GraphOps;
use noema::retrieve::ContextRetriever;
use noema::schema_registry::SchemaRegistry;
use noema::storage::{GraphDatabase, SqliteGraphDatabase};
use noema::user_service::{UserError, UserService};
use noema::vector::{InMemoryVectorStore, VectorStore};

const DIM: usize = 8;

struct Harness {
    users: UserService,
    ops: Arc<GraphOps>,
    schemas: Arc<SchemaRegistry>,
}

impl Harness {
    async fn new() -> Self {
        let db: Arc<dyn GraphDatabase> = Arc::new(SqliteGraphDatabase::open_in_memory().unwrap());
        db.initialize().await.unwrap();
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(DIM));
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(DIM));
        let ops = Arc::new(GraphOps::new(db.clone(), vectors.clone(), embedder));
        let schemas = Arc::new(SchemaRegistry::new(db.clone()));
        let users = UserService::new(db, vectors, schemas.clone());
        Self { users, ops, schemas }
    }

    fn constructor(&self, extractor: MockExtractor) -> Constructor {
        let retriever = Arc::new(ContextRetriever::new(self.ops.clone()));
        Constructor::new(
            self.ops.clone(),
            self.schemas.clone(),
            retriever,
            Arc::new(extractor),
            Duration::from_secs(1),
            2,
        )
    }
}

#[tokio::test]
async fn s1_create_delete_round_trip() {
    let h = Harness::new().await;
    let outcome = h.users.create_user("alice").await.unwrap();
    assert!(outcome.created);

    h.users.delete_user("alice").await.unwrap();

    let err = h.users.delete_user("alice").await.unwrap_err();
    assert!(matches!(err, UserError::UserAbsent));
}

#[tokio::test]
async fn s2_idempotent_ingestion() {
    let h = Harness::new().await;
    h.users.create_user("bob").await.unwrap();

    let extractor = MockExtractor::new().with_nodes(
        "Quantum computing relates to cryptography.",
        vec![
            ExtractedNode::new("Quantum computing"),
            ExtractedNode::new("Cryptography"),
        ],
    );
    let constructor = h.constructor(extractor);
    let data = UnstructuredData::new("Quantum computing relates to cryptography.");

    constructor.ingest(&data, "bob").await.unwrap();
    let count_after_first = h.ops.get_all_nodes("bob").await.unwrap().len();

    constructor.ingest(&data, "bob").await.unwrap();
    let count_after_second = h.ops.get_all_nodes("bob").await.unwrap().len();

    assert_eq!(count_after_first, count_after_second);
}

#[tokio::test]
async fn s3_isolation_between_users() {
    let h = Harness::new().await;
    h.users.create_user("u1").await.unwrap();
    h.users.create_user("u2").await.unwrap();

    let extractor_u1 = MockExtractor::new().with_nodes(
        "I love dogs, especially retrievers",
        vec![ExtractedNode::new("dogs"), ExtractedNode::new("retrievers")],
    );
    h.constructor(extractor_u1)
        .ingest(&UnstructuredData::new("I love dogs, especially retrievers"), "u1")
        .await
        .unwrap();

    let extractor_u2 = MockExtractor::new().with_nodes(
        "I love cats, especially siamese",
        vec![ExtractedNode::new("cats"), ExtractedNode::new("siamese")],
    );
    h.constructor(extractor_u2)
        .ingest(&UnstructuredData::new("I love cats, especially siamese"), "u2")
        .await
        .unwrap();

    // Isolation invariant: a search scoped to u1 never surfaces u2's nodes,
    // regardless of what the query text is.
    let search = h.ops.text_similarity_search("cats", "u1", 5).await.unwrap();
    assert!(search.results.iter().all(|hit| hit.node_name != "cats" && hit.node_name != "siamese"));

    let u2_nodes = h.ops.get_all_nodes("u2").await.unwrap();
    for node in &u2_nodes {
        let lower = node.name.to_lowercase();
        assert!(!lower.contains("dog"));
        assert!(!lower.contains("retriever"));
    }
}

#[tokio::test]
async fn s4_empty_content_rejected() {
    let h = Harness::new().await;
    h.users.create_user("alice").await.unwrap();

    let constructor = h.constructor(MockExtractor::new());
    let err = constructor
        .ingest(&UnstructuredData::new("   "), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ConstructError::EmptyContent));
    assert!(h.ops.get_all_nodes("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn s5_cascade_deletion() {
    let h = Harness::new().await;
    h.users.create_user("carol").await.unwrap();

    let extractor = MockExtractor::new()
        .with_nodes("Carol studies violin", vec![ExtractedNode::new("Violin")]);
    h.constructor(extractor)
        .ingest(&UnstructuredData::new("Carol studies violin"), "carol")
        .await
        .unwrap();

    assert!(!h.ops.get_all_nodes("carol").await.unwrap().is_empty());

    h.users.delete_user("carol").await.unwrap();

    assert!(!h.users.user_exists("carol").await.unwrap());
    let err = h.ops.get_all_nodes("carol").await.unwrap_err();
    assert!(matches!(err, noema::ops::OpsError::UserAbsent));
}

#[tokio::test]
async fn s6_schema_guided_typing() {
    let h = Harness::new().await;
    h.users.create_user("dave").await.unwrap();
    h.schemas
        .store_schema(
            &GraphSchema::new("Work", "Work relationships")
                .with_attributes(["PERSON", "PROJECT"])
                .with_relationships(["WORKS_ON"]),
            "dave",
        )
        .await
        .unwrap();

    let extractor = MockExtractor::new()
        .with_nodes(
            "Alice works on FocusFlow",
            vec![
                ExtractedNode::new("Alice").with_type("PERSON"),
                ExtractedNode::new("FocusFlow").with_type("PROJECT"),
            ],
        )
        .with_relationships(
            "",
            vec![Relationship::new("Alice", "FocusFlow", "WORKS_ON")],
        );

    h.constructor(extractor)
        .ingest(&UnstructuredData::new("Alice works on FocusFlow"), "dave")
        .await
        .unwrap();

    let nodes = h.ops.get_all_nodes("dave").await.unwrap();
    assert!(nodes.iter().any(|n| n.node_type == "PERSON"));
    assert!(nodes.iter().any(|n| n.node_type == "PROJECT"));

    let rels = h.ops.get_all_relationships("dave").await.unwrap();
    assert!(rels.iter().any(|r| r.relation == "WORKS_ON"));
}
