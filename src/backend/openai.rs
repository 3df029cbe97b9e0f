use super::{BackendError, BackendResponse, LlmBackend};
use crate::schema::{FunctionSpec, OpenAiSchema, SchemaAdapter};
use crate::types::{ContentBlock, Role, ToolCallRequest, Turn};

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
    ChatCompletionResponseStream, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionObject,
};
use async_stream::stream;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::pin::Pin;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gpt-4.1";

#[derive(Debug, Clone, PartialEq)]
enum StreamPart {
    Content(String),
    ToolCall(ToolCallRequest),
}

type PartStream = Pin<Box<dyn Stream<Item = Result<StreamPart, BackendError>> + Send>>;

pub struct OpenAiBackend {
    inner: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    pub fn new(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            inner: Client::with_config(config),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn schema_adapter(&self) -> &dyn SchemaAdapter {
        &OpenAiSchema
    }

    async fn generate(
        &self,
        transcript: &[Turn],
        tools: &[FunctionSpec],
    ) -> Result<BackendResponse, BackendError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.as_str())
            .messages(encode_messages(transcript))
            .n(1);
        if !tools.is_empty() {
            args.tools(tools.iter().map(ChatCompletionTool::from).collect::<Vec<_>>());
        }
        let request = args
            .build()
            .map_err(|err| BackendError::Request(err.to_string()))?;

        debug!(model = %self.model, turns = transcript.len(), "sending chat completion");
        let stream = self
            .inner
            .chat()
            .create_stream(request)
            .await
            .map_err(BackendError::from)?;

        let mut parts = map_stream(stream);
        let mut collected = vec![];
        while let Some(part) = parts.next().await {
            collected.push(part?);
        }
        Ok(collect_parts(collected))
    }
}

impl From<&FunctionSpec> for ChatCompletionTool {
    fn from(value: &FunctionSpec) -> Self {
        Self {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: value.name.clone(),
                description: Some(value.description.clone()),
                parameters: Some(value.parameters.clone()),
                strict: None,
            },
        }
    }
}

impl From<OpenAIError> for BackendError {
    fn from(error: OpenAIError) -> Self {
        match error {
            OpenAIError::ApiError(api) if api.code.as_deref() == Some("rate_limit_exceeded") => {
                BackendError::RateLimited
            }
            OpenAIError::ApiError(api) => BackendError::Api {
                status: 0,
                message: api.message,
            },
            OpenAIError::StreamError(message) => stream_error(message),
            OpenAIError::JSONDeserialize(err) => BackendError::Decode(err.to_string()),
            OpenAIError::InvalidArgument(message) => BackendError::Request(message),
            other => BackendError::Transport(other.to_string()),
        }
    }
}

// a rejected stream only reports "Invalid status code: 429 Too Many Requests"
fn stream_error(message: String) -> BackendError {
    let status = message
        .split("status code:")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|code| code.parse::<u16>().ok());
    match status {
        Some(429) => BackendError::RateLimited,
        Some(status) => BackendError::Api { status, message },
        None => BackendError::Transport(message),
    }
}

/// Chat messages for a transcript: one `tool` message per result.
/// Nameless calls were answered locally and are left out.
pub(crate) fn encode_messages(transcript: &[Turn]) -> Vec<ChatCompletionRequestMessage> {
    let mut messages = vec![];
    let mut nameless: HashSet<&str> = HashSet::new();
    for turn in transcript {
        match turn.role() {
            Role::User => messages.push(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(turn.text()),
                    name: None,
                },
            )),
            Role::Assistant => {
                let text = turn.text();
                let tool_calls: Vec<_> = turn
                    .tool_requests()
                    .filter(|&call| {
                        if call.name.is_empty() {
                            nameless.insert(call.id.as_str());
                        }
                        !call.name.is_empty()
                    })
                    .map(|call| ChatCompletionMessageToolCall {
                        id: call.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            arguments: call.raw_arguments(),
                            name: call.name.clone(),
                        },
                    })
                    .collect();
                if text.is_empty() && tool_calls.is_empty() {
                    continue;
                }
                messages.push(ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessage {
                        content: if text.is_empty() {
                            None
                        } else {
                            Some(ChatCompletionRequestAssistantMessageContent::Text(text))
                        },
                        tool_calls: if tool_calls.is_empty() {
                            None
                        } else {
                            Some(tool_calls)
                        },
                        ..Default::default()
                    },
                ));
            }
            Role::ToolResult => {
                for result in turn.tool_results() {
                    if nameless.contains(result.call_id.as_str()) {
                        continue;
                    }
                    let content = if result.success {
                        result.payload_text()
                    } else {
                        json!({ "error": result.payload }).to_string()
                    };
                    messages.push(ChatCompletionRequestMessage::Tool(
                        ChatCompletionRequestToolMessage {
                            content: ChatCompletionRequestToolMessageContent::Text(content),
                            tool_call_id: result.call_id.clone(),
                        },
                    ));
                }
            }
        }
    }
    messages
}

/// Reassembles tool calls streamed as fragments keyed by index.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    json: String,
}

impl ToolCallAccumulator {
    fn push(&mut self, index: u32, id: Option<&str>, name: Option<&str>, arguments: Option<&str>) {
        let partial = self.calls.entry(index).or_default();
        if let Some(id) = id {
            partial.id = id.to_string();
        }
        if let Some(name) = name {
            partial.name.push_str(name);
        }
        if let Some(arguments) = arguments {
            partial.json.push_str(arguments);
        }
    }

    fn drain(&mut self) -> Vec<ToolCallRequest> {
        std::mem::take(&mut self.calls)
            .into_values()
            .map(|call| ToolCallRequest::from_raw_arguments(call.id, call.name, &call.json))
            .collect()
    }
}

fn map_stream(mut stream: ChatCompletionResponseStream) -> PartStream {
    Box::pin(stream! {
        let mut tool_calls = ToolCallAccumulator::default();
        while let Some(part) = stream.next().await {
            match part {
                Ok(part) => {
                    let Some(first) = part.choices.first() else {
                        continue;
                    };
                    if let Some(content) = &first.delta.content {
                        yield Ok(StreamPart::Content(content.clone()));
                    }
                    for call in first.delta.tool_calls.as_deref().unwrap_or_default() {
                        let function = call.function.as_ref();
                        tool_calls.push(
                            call.index,
                            call.id.as_deref(),
                            function.and_then(|f| f.name.as_deref()),
                            function.and_then(|f| f.arguments.as_deref()),
                        );
                    }
                    if let Some(FinishReason::ToolCalls) = first.finish_reason {
                        for call in tool_calls.drain() {
                            yield Ok(StreamPart::ToolCall(call));
                        }
                    }
                }
                Err(error) => {
                    yield Err(BackendError::from(error));
                    break;
                }
            }
        }
        // some servers finish with `stop` even when tool calls were streamed
        for call in tool_calls.drain() {
            yield Ok(StreamPart::ToolCall(call));
        }
    })
}

fn collect_parts(parts: Vec<StreamPart>) -> BackendResponse {
    let mut text = String::new();
    let mut calls = vec![];
    for part in parts {
        match part {
            StreamPart::Content(chunk) => text.push_str(&chunk),
            StreamPart::ToolCall(call) => calls.push(ContentBlock::ToolRequest(call)),
        }
    }
    let stop_reason = if calls.is_empty() { "stop" } else { "tool_calls" };
    let mut blocks = vec![];
    if !text.is_empty() {
        blocks.push(ContentBlock::text(text));
    }
    blocks.extend(calls);
    BackendResponse::new(blocks, Some(stop_reason.to_string()))
}
