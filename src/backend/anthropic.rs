use super::{BackendError, BackendResponse, LlmBackend, status_error};
use crate::schema::{FunctionSpec, PassthroughSchema, SchemaAdapter};
use crate::types::{ContentBlock, Role, ToolCallRequest, Turn};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashSet;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const MAX_TOKENS: u32 = 4096;

pub struct AnthropicBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, transcript: &[Turn], tools: &[FunctionSpec]) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": encode_messages(transcript),
        });
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect();
        }
        body
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn schema_adapter(&self) -> &dyn SchemaAdapter {
        &PassthroughSchema
    }

    async fn generate(
        &self,
        transcript: &[Turn],
        tools: &[FunctionSpec],
    ) -> Result<BackendResponse, BackendError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = %self.model, turns = transcript.len(), "sending messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(transcript, tools))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "anthropic api error");
            return Err(status_error(status, body));
        }

        let body: MessagesResponse = response.json().await?;
        Ok(decode_response(body))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

fn decode_response(response: MessagesResponse) -> BackendResponse {
    let blocks = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ResponseBlock::Text { text } => Some(ContentBlock::text(text)),
            ResponseBlock::ToolUse { id, name, input } => Some(ContentBlock::ToolRequest(
                ToolCallRequest::new(id, name, input),
            )),
            ResponseBlock::Other => None,
        })
        .collect();
    BackendResponse::new(blocks, response.stop_reason)
}

// Nameless calls were answered locally and are left off the wire.
fn encode_messages(transcript: &[Turn]) -> Vec<Value> {
    let mut messages: Vec<Value> = vec![];
    let mut previous = None;
    let mut nameless: HashSet<&str> = HashSet::new();
    for turn in transcript {
        match turn.role() {
            Role::User => messages.push(json!({ "role": "user", "content": turn.text() })),
            Role::Assistant => {
                let content: Vec<Value> = turn
                    .blocks()
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } if !text.is_empty() => {
                            Some(json!({ "type": "text", "text": text }))
                        }
                        ContentBlock::ToolRequest(call) if call.name.is_empty() => {
                            nameless.insert(call.id.as_str());
                            None
                        }
                        ContentBlock::ToolRequest(call) => Some(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": if call.arguments.is_object() {
                                call.arguments.clone()
                            } else {
                                json!({})
                            },
                        })),
                        _ => None,
                    })
                    .collect();
                if content.is_empty() {
                    continue;
                }
                messages.push(json!({ "role": "assistant", "content": content }));
            }
            Role::ToolResult => {
                let results: Vec<Value> = turn
                    .tool_results()
                    .filter(|result| !nameless.contains(result.call_id.as_str()))
                    .map(|result| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": result.call_id,
                            "content": result.payload_text(),
                            "is_error": !result.success,
                        })
                    })
                    .collect();
                if results.is_empty() {
                    continue;
                }
                let merge = previous == Some(Role::ToolResult);
                match messages.last_mut() {
                    Some(last) if merge => {
                        if let Some(content) = last["content"].as_array_mut() {
                            content.extend(results);
                        }
                    }
                    _ => messages.push(json!({ "role": "user", "content": results })),
                }
            }
        }
        previous = Some(turn.role());
    }
    messages
}
