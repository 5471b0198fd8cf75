//! `Generator`: prompt + context → answer text or structured object.

#[cfg(feature = "real_llm")]
mod subprocess;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[cfg(feature = "real_llm")]
pub use subprocess::SubprocessGenerator;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generator provider failed: {0}")]
    GenerateFailed(String),
}

pub type GenerateResult<T> = Result<T, GenerateError>;

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, context: &str) -> GenerateResult<String>;

    async fn generate_structured(
        &self,
        schema: &Value,
        prompt: &str,
        context: &str,
    ) -> GenerateResult<Value>;
}

/// Canned/templated generator for tests. Without a configured response,
/// echoes the prompt and context into a stable templated string so
/// assertions on the shape of `RAGInterface::query` don't need the mock
/// preconfigured for every query.
#[derive(Default)]
pub struct MockGenerator {
    text_responses: Mutex<HashMap<String, String>>,
    structured_responses: Mutex<HashMap<String, Value>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        self.text_responses.lock().unwrap().insert(prompt.into(), answer.into());
        self
    }

    pub fn with_structured_response(self, prompt: impl Into<String>, value: Value) -> Self {
        self.structured_responses
            .lock()
            .unwrap()
            .insert(prompt.into(), value);
        self
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str, context: &str) -> GenerateResult<String> {
        if let Some(answer) = self.text_responses.lock().unwrap().get(prompt) {
            return Ok(answer.clone());
        }
        Ok(format!("[mock answer for {prompt:?} given context:\n{context}]"))
    }

    async fn generate_structured(
        &self,
        _schema: &Value,
        prompt: &str,
        context: &str,
    ) -> GenerateResult<Value> {
        if let Some(value) = self.structured_responses.lock().unwrap().get(prompt) {
            return Ok(value.clone());
        }
        Ok(serde_json::json!({ "prompt": prompt, "context": context }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn configured_response_is_returned_verbatim() {
        let generator = MockGenerator::new().with_response("q", "42");
        assert_eq!(generator.generate("q", "ctx").await.unwrap(), "42");
    }

    #[tokio::test]
    async fn unconfigured_prompt_falls_back_to_templated_echo() {
        let generator = MockGenerator::new();
        let answer = generator.generate("who?", "ctx").await.unwrap();
        assert!(answer.contains("who?"));
        assert!(answer.contains("ctx"));
    }
}
