//! MCP server exposing the service's operations as tools over stdio — this
//! crate's process boundary.
//!
//! Tools: 2 user lifecycle + ingest + 2 RAG queries + ask + custom-data +
//! version = 8 total.

pub mod params;

use std::sync::Arc;

use params::*;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};

use crate::config::Config;
use crate::construct::{Constructor, UnstructuredData};
use crate::embed::{Embedder, MockEmbedder};
use crate::extract::{Extractor, MockExtractor};
use crate::generate::{Generator, MockGenerator};
use crate::ops::GraphOps;
use crate::rag::{AskService, CustomDataRequest, CustomDataService, RagInterface};
use crate::retrieve::ContextRetriever;
use crate::schema_registry::SchemaRegistry;
use crate::storage::{GraphDatabase, SqliteGraphDatabase};
use crate::user_service::UserService;
use crate::vector::{InMemoryVectorStore, VectorStore};

fn ok_text(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn err_text(msg: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg)]))
}

fn ok_json(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    ok_text(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
}

#[derive(Clone)]
pub struct NoemaMcpServer {
    users: Arc<UserService>,
    constructor: Arc<Constructor>,
    rag: Arc<RagInterface>,
    ask: Arc<AskService>,
    custom_data: Arc<CustomDataService>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl NoemaMcpServer {
    pub fn new(
        users: Arc<UserService>,
        constructor: Arc<Constructor>,
        rag: Arc<RagInterface>,
        ask: Arc<AskService>,
        custom_data: Arc<CustomDataService>,
    ) -> Self {
        Self {
            users,
            constructor,
            rag,
            ask,
            custom_data,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Create a user's isolated subgraph, seeding the default schema")]
    async fn create_user(
        &self,
        Parameters(p): Parameters<UserIdParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.users.create_user(&p.user_id).await {
            Ok(outcome) => {
                let message = if outcome.created {
                    format!("user '{}' created", p.user_id)
                } else {
                    format!("user '{}' already exists", p.user_id)
                };
                ok_json(serde_json::json!({ "message": message }))
            }
            Err(err) => err_text(err.to_string()),
        }
    }

    #[tool(description = "Delete a user's subgraph, vectors, and schemas")]
    async fn delete_user(
        &self,
        Parameters(p): Parameters<UserIdParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.users.delete_user(&p.user_id).await {
            Ok(()) => ok_json(serde_json::json!({
                "message": format!("user '{}' deleted", p.user_id)
            })),
            Err(err) => err_text(err.to_string()),
        }
    }

    #[tool(description = "Ingest unstructured text into a user's subgraph, extracting nodes and relationships")]
    async fn ingest(
        &self,
        Parameters(p): Parameters<IngestParams>,
    ) -> Result<CallToolResult, McpError> {
        let data = UnstructuredData {
            title: p.title,
            content: p.content,
            metadata: p.metadata.unwrap_or_default().into_iter().collect(),
        };
        match self.constructor.ingest(&data, &p.user_id).await {
            Ok(update) => ok_json(serde_json::json!({
                "message": format!(
                    "ingested {} nodes, {} relationships",
                    update.nodes.len(),
                    update.relationships.len()
                )
            })),
            Err(err) => err_text(err.to_string()),
        }
    }

    #[tool(description = "Answer a query using similarity-seeded graph context and the generator")]
    async fn rag_query(
        &self,
        Parameters(p): Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.rag.query(&p.query, &p.user_id).await {
            Ok(answer) => ok_json(serde_json::json!({ "answer": answer })),
            Err(err) => err_text(err.to_string()),
        }
    }

    #[tool(description = "Answer a query using only top-k similar node names, skipping traversal (ablation)")]
    async fn rag_query_vector_only(
        &self,
        Parameters(p): Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.rag.query_vector_only(&p.query, &p.user_id).await {
            Ok(response) => ok_json(serde_json::json!({ "query": p.query, "response": response })),
            Err(err) => err_text(err.to_string()),
        }
    }

    #[tool(description = "Ask for a structured answer conforming to a caller-supplied JSON schema")]
    async fn ask(
        &self,
        Parameters(p): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.ask.ask(&p.user_id, &p.query, &p.output_schema).await {
            Ok(result) => ok_json(serde_json::json!({ "result": result })),
            Err(err) => err_text(err.to_string()),
        }
    }

    #[tool(description = "Write pre-extracted nodes and relationships directly, bypassing the extractor")]
    async fn custom_data(
        &self,
        Parameters(p): Parameters<CustomDataParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = CustomDataRequest {
            nodes: p.nodes,
            relationships: p.relationships,
        };
        match self.custom_data.update_custom_data(&p.user_id, request).await {
            Ok(response) => ok_json(serde_json::json!({ "status": response })),
            Err(err) => err_text(err.to_string()),
        }
    }

    #[tool(description = "Report this server's crate version")]
    fn version(&self) -> Result<CallToolResult, McpError> {
        ok_json(serde_json::json!({ "version": crate::VERSION }))
    }
}

#[tool_handler]
impl ServerHandler for NoemaMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Noema MCP server — per-user personal knowledge graph with schema-guided \
                 extraction and RAG retrieval"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Wires up the reference backends (SQLite graph store, in-memory vector
/// index, mock embedder/extractor/generator unless `real_llm`/`embeddings`
/// select otherwise) and serves `NoemaMcpServer` on stdio until the peer
/// disconnects. Returns a process exit code.
pub fn run_mcp_server() -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {e}");
            return 1;
        }
    };

    rt.block_on(async {
        let config = match Config::from_env() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("invalid configuration: {e}");
                return 1;
            }
        };

        let db: Arc<dyn GraphDatabase> = match SqliteGraphDatabase::open(std::path::Path::new(&config.db_path)) {
            Ok(db) => Arc::new(db),
            Err(e) => {
                eprintln!("failed to open database at {}: {e}", config.db_path);
                return 1;
            }
        };
        if let Err(e) = db.initialize().await {
            eprintln!("failed to initialize database: {e}");
            return 1;
        }

        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(config.embedding_dim));
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(config.embedding_dim));
        let extractor: Arc<dyn Extractor> = Arc::new(MockExtractor::new());
        let generator: Arc<dyn Generator> = Arc::new(MockGenerator::new());

        let ops = Arc::new(GraphOps::new(db.clone(), vectors.clone(), embedder));
        let schemas = Arc::new(SchemaRegistry::new(db.clone()));
        let retriever = Arc::new(ContextRetriever::new(ops.clone()));
        let constructor = Arc::new(Constructor::new(
            ops.clone(),
            schemas.clone(),
            retriever.clone(),
            extractor,
            config.ingest_lock_timeout,
            config.max_hops,
        ));
        let rag = Arc::new(RagInterface::new(
            ops.clone(),
            retriever,
            generator.clone(),
            config.similarity_top_k,
            config.max_hops,
        ));
        let ask = Arc::new(AskService::new(rag.clone(), generator));
        let custom_data = Arc::new(CustomDataService::new(ops));
        let users = Arc::new(UserService::new(db, vectors, schemas));

        let server = NoemaMcpServer::new(users, constructor, rag, ask, custom_data);

        eprintln!("noema mcp server starting on stdio...");

        use rmcp::ServiceExt;
        let service = match server.serve(rmcp::transport::stdio()).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to start MCP server: {e}");
                return 1;
            }
        };

        if let Err(e) = service.waiting().await {
            eprintln!("MCP server error: {e}");
            return 1;
        }

        0
    })
}
