//! `SubprocessGenerator` — the `Generator` counterpart to
//! `extract::SubprocessExtractor`, talking to the same class of external
//! LLM-orchestration process over MCP.

use std::borrow::Cow;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, Content};
use rmcp::service::Peer;
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{GenerateError, GenerateResult, Generator};

pub struct SubprocessGenerator {
    command: String,
    args: Vec<String>,
    peer: Mutex<Option<Peer<RoleClient>>>,
}

impl SubprocessGenerator {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            peer: Mutex::new(None),
        }
    }

    async fn connect(&self) -> GenerateResult<Peer<RoleClient>> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(&self.args);

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| GenerateError::GenerateFailed(format!("failed to spawn generator: {e}")))?;

        let service = ()
            .serve(transport)
            .await
            .map_err(|e| GenerateError::GenerateFailed(format!("MCP handshake failed: {e}")))?;

        Ok(service.peer().clone())
    }

    async fn get_peer(&self) -> GenerateResult<Peer<RoleClient>> {
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
        arguments: serde_json::Map<String, Value>,
    ) -> GenerateResult<String> {
        let peer = self.get_peer().await?;
        let result = peer
            .call_tool(CallToolRequestParams {
                meta: None,
                name: Cow::Owned(tool_name.to_string()),
                arguments: Some(arguments),
                task: None,
            })
            .await
            .map_err(|e| GenerateError::GenerateFailed(format!("call_tool failed: {e}")))?;

        if result.is_error == Some(true) {
            return Err(GenerateError::GenerateFailed(extract_text(&result.content)));
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
impl Generator for SubprocessGenerator {
    async fn generate(&self, prompt: &str, context: &str) -> GenerateResult<String> {
        let mut args = serde_json::Map::new();
        args.insert("prompt".into(), prompt.into());
        args.insert("context".into(), context.into());
        self.call_tool("generate", args).await
    }

    async fn generate_structured(
        &self,
        schema: &Value,
        prompt: &str,
        context: &str,
    ) -> GenerateResult<Value> {
        let mut args = serde_json::Map::new();
        args.insert("schema".into(), schema.clone());
        args.insert("prompt".into(), prompt.into());
        args.insert("context".into(), context.into());
        let text = self.call_tool("generate_structured", args).await?;
        serde_json::from_str(&text)
            .map_err(|e| GenerateError::GenerateFailed(format!("failed to parse structured result: {e}")))
    }
}
