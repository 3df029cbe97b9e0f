use super::{BackendError, BackendResponse, LlmBackend, status_error};
use crate::schema::{FunctionSpec, GeminiSchema, SchemaAdapter};
use crate::types::{ContentBlock, Role, ToolCallRequest, Turn, is_synthetic_call_id};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiBackend {
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
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn schema_adapter(&self) -> &dyn SchemaAdapter {
        &GeminiSchema
    }

    async fn generate(
        &self,
        transcript: &[Turn],
        tools: &[FunctionSpec],
    ) -> Result<BackendResponse, BackendError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!(model = %self.model, turns = transcript.len(), "sending generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(transcript, tools))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "gemini api error");
            return Err(status_error(status, body));
        }

        let body: GenerateResponse = response.json().await?;
        Ok(decode_response(body))
    }
}

fn request_body(transcript: &[Turn], tools: &[FunctionSpec]) -> Value {
    let mut body = json!({ "contents": encode_contents(transcript) });
    if !tools.is_empty() {
        let declarations: Vec<Value> = tools.iter().map(function_declaration).collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }
    body
}

fn function_declaration(tool: &FunctionSpec) -> Value {
    let mut declaration = json!({ "name": tool.name, "description": tool.description });
    // an object schema with no properties is rejected; argument-free tools omit it
    let has_properties = tool.parameters["properties"]
        .as_object()
        .is_some_and(|props| !props.is_empty());
    if has_properties {
        declaration["parameters"] = tool.parameters.clone();
    }
    declaration
}

// Nameless calls were answered locally and are not replayed. The responses to
// one model turn share a single `user` content.
fn encode_contents(transcript: &[Turn]) -> Vec<Value> {
    let mut names: HashMap<&str, &str> = HashMap::new();
    let mut contents: Vec<Value> = vec![];
    let mut open_responses = false;
    for turn in transcript {
        match turn.role() {
            Role::User => {
                contents.push(json!({
                    "role": "user",
                    "parts": [{ "text": turn.text() }],
                }));
                open_responses = false;
            }
            Role::Assistant => {
                let parts: Vec<Value> = turn
                    .blocks()
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } if !text.is_empty() => {
                            Some(json!({ "text": text }))
                        }
                        ContentBlock::ToolRequest(call) if !call.name.is_empty() => {
                            names.insert(call.id.as_str(), call.name.as_str());
                            let mut function_call = Map::new();
                            if !is_synthetic_call_id(&call.id) {
                                function_call.insert("id".into(), json!(call.id));
                            }
                            function_call.insert("name".into(), json!(call.name));
                            function_call.insert("args".into(), call.arguments.clone());
                            Some(json!({ "functionCall": function_call }))
                        }
                        _ => None,
                    })
                    .collect();
                if parts.is_empty() {
                    continue;
                }
                contents.push(json!({ "role": "model", "parts": parts }));
                open_responses = false;
            }
            Role::ToolResult => {
                for result in turn.tool_results() {
                    let Some(name) = names.get(result.call_id.as_str()).copied() else {
                        continue;
                    };
                    let mut function_response = Map::new();
                    if !is_synthetic_call_id(&result.call_id) {
                        function_response.insert("id".into(), json!(result.call_id));
                    }
                    function_response.insert("name".into(), json!(name));
                    let response = if result.success {
                        json!({ "output": result.payload })
                    } else {
                        json!({ "error": result.payload })
                    };
                    function_response.insert("response".into(), response);
                    let part = json!({ "functionResponse": function_response });

                    match contents.last_mut() {
                        Some(Value::Object(last)) if open_responses => {
                            if let Some(Value::Array(parts)) = last.get_mut("parts") {
                                parts.push(part);
                            }
                        }
                        _ => {
                            contents.push(json!({ "role": "user", "parts": [part] }));
                            open_responses = true;
                        }
                    }
                }
            }
        }
    }
    contents
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCallPart>,
}

#[derive(Debug, Deserialize)]
struct FunctionCallPart {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    args: Option<Value>,
}

fn decode_response(response: GenerateResponse) -> BackendResponse {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return BackendResponse::new(vec![], None);
    };
    let parts = candidate.content.map(|content| content.parts).unwrap_or_default();
    let mut blocks = vec![];
    for part in parts {
        if let Some(text) = part.text {
            blocks.push(ContentBlock::text(text));
        }
        if let Some(call) = part.function_call {
            blocks.push(ContentBlock::ToolRequest(ToolCallRequest::new(
                call.id.unwrap_or_default(),
                call.name.unwrap_or_default(),
                call.args.unwrap_or_else(|| json!({})),
            )));
        }
    }
    BackendResponse::new(blocks, candidate.finish_reason)
}
