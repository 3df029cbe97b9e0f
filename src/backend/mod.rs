pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use crate::schema::{FunctionSpec, SchemaAdapter};
use crate::types::{ContentBlock, Turn, synthetic_call_id};
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rate limited by backend")]
    RateLimited,
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("could not decode backend response: {0}")]
    Decode(String),
    #[error("could not build request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            BackendError::Decode(error.to_string())
        } else {
            BackendError::Transport(error.to_string())
        }
    }
}

/// One model reply: text and tool requests in the order the model produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
    pub blocks: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
}

impl BackendResponse {
    /// Gives every tool request a non-empty id that is unique within the reply.
    pub fn new(mut blocks: Vec<ContentBlock>, stop_reason: Option<String>) -> Self {
        let mut seen = HashSet::new();
        for block in &mut blocks {
            if let ContentBlock::ToolRequest(request) = block {
                if request.id.is_empty() || !seen.insert(request.id.clone()) {
                    request.id = synthetic_call_id();
                    seen.insert(request.id.clone());
                }
            }
        }
        Self {
            blocks,
            stop_reason,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ContentBlock::text(text)], Some("stop".to_string()))
    }
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn name(&self) -> &str;

    fn schema_adapter(&self) -> &dyn SchemaAdapter;

    /// `tools` is empty when no tools should be offered.
    async fn generate(
        &self,
        transcript: &[Turn],
        tools: &[FunctionSpec],
    ) -> Result<BackendResponse, BackendError>;
}

fn status_error(status: reqwest::StatusCode, body: String) -> BackendError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        BackendError::RateLimited
    } else {
        BackendError::Api {
            status: status.as_u16(),
            message: body,
        }
    }
}
