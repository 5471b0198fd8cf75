//! `SubprocessExtractor` — spawns an external LLM-orchestration process and
//! speaks MCP to it: a persistent peer connection established lazily on
//! first use, guarded by a mutex.

use std::borrow::Cow;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, Content};
use rmcp::service::Peer;
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use tokio::sync::Mutex;

use crate::graph::Relationship;

use super::{ExtractError, ExtractResult, ExtractedNode, Extractor};

pub struct SubprocessExtractor {
    command: String,
    args: Vec<String>,
    peer: Mutex<Option<Peer<RoleClient>>>,
}

impl SubprocessExtractor {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            peer: Mutex::new(None),
        }
    }

    async fn connect(&self) -> ExtractResult<Peer<RoleClient>> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(&self.args);

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| ExtractError::ExtractFailed(format!("failed to spawn extractor: {e}")))?;

        let service = ()
            .serve(transport)
            .await
            .map_err(|e| ExtractError::ExtractFailed(format!("MCP handshake failed: {e}")))?;

        Ok(service.peer().clone())
    }

    async fn get_peer(&self) -> ExtractResult<Peer<RoleClient>> {
        let mut guard = self.peer.lock().await;
        if let Some(ref peer) = *guard {
            return Ok(peer.clone());
        }
        let peer = self.connect().await?;
        *guard = Some(peer.clone());
        Ok(peer)
    }

    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> ExtractResult<String> {
        let peer = self.get_peer().await?;
        let result = peer
            .call_tool(CallToolRequestParams {
                meta: None,
                name: Cow::Owned(tool_name.to_string()),
                arguments: Some(arguments),
                task: None,
            })
            .await
            .map_err(|e| ExtractError::ExtractFailed(format!("call_tool failed: {e}")))?;

        if result.is_error == Some(true) {
            return Err(ExtractError::ExtractFailed(extract_text(&result.content)));
        }
        Ok(extract_text(&result.content))
    }
}

fn extract_text(content: &[Content]) -> String {
    content
        .iter()
        .filter_map(|c| c.as_text().map(|tc| tc.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Extractor for SubprocessExtractor {
    async fn get_nodes(
        &self,
        text: &str,
        schema_context: &str,
    ) -> ExtractResult<Vec<ExtractedNode>> {
        let mut args = serde_json::Map::new();
        args.insert("text".into(), text.into());
        args.insert("schema_context".into(), schema_context.into());
        let response_text = self.call_tool("get_nodes", args).await?;
        serde_json::from_str(&response_text)
            .map_err(|e| ExtractError::ExtractFailed(format!("failed to parse nodes: {e}")))
    }

    async fn get_relationships(
        &self,
        nodes: &[ExtractedNode],
        schema_context: &str,
        graph_context: &str,
    ) -> ExtractResult<Vec<Relationship>> {
        let mut args = serde_json::Map::new();
        args.insert(
            "nodes".into(),
            serde_json::to_value(nodes)
                .map_err(|e| ExtractError::ExtractFailed(e.to_string()))?,
        );
        args.insert("schema_context".into(), schema_context.into());
        args.insert("graph_context".into(), graph_context.into());
        let response_text = self.call_tool("get_relationships", args).await?;
        serde_json::from_str(&response_text)
            .map_err(|e| ExtractError::ExtractFailed(format!("failed to parse relationships: {e}")))
    }
}
