use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SYNTHETIC_CALL_PREFIX: &str = "local-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Parses a raw argument string as sent by function-calling APIs.
    /// Text that is not JSON is kept verbatim so the transcript replays exactly.
    pub fn from_raw_arguments(
        id: impl Into<String>,
        name: impl Into<String>,
        raw: &str,
    ) -> Self {
        let arguments = if raw.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        };
        Self::new(id, name, arguments)
    }

    pub fn raw_arguments(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// Outcome of one tool call, answering the request with the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub call_id: String,
    pub payload: Value,
    pub success: bool,
}

impl ToolCallResult {
    pub fn success(call_id: impl Into<String>, payload: Value) -> Self {
        Self {
            call_id: call_id.into(),
            payload,
            success: true,
        }
    }

    pub fn failure(call_id: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            call_id: call_id.into(),
            payload: payload.into(),
            success: false,
        }
    }

    /// Payload flattened to text, as most wire formats carry tool output.
    pub fn payload_text(&self) -> String {
        match &self.payload {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolRequest(ToolCallRequest),
    ToolResult(ToolCallResult),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    blocks: Vec<ContentBlock>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            blocks,
        }
    }

    pub fn tool_result(result: ToolCallResult) -> Self {
        Self {
            role: Role::ToolResult,
            blocks: vec![ContentBlock::ToolResult(result)],
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_requests(&self) -> impl Iterator<Item = &ToolCallRequest> {
        self.blocks.iter().filter_map(|block| match block {
            ContentBlock::ToolRequest(request) => Some(request),
            _ => None,
        })
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolCallResult> {
        self.blocks.iter().filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    pub fn has_tool_requests(&self) -> bool {
        self.tool_requests().next().is_some()
    }
}

/// Call ids a backend never assigned are minted locally with a recognizable prefix.
pub fn synthetic_call_id() -> String {
    let suffix: u64 = rand::rng().random();
    format!("{SYNTHETIC_CALL_PREFIX}{suffix:016x}")
}

pub fn is_synthetic_call_id(id: &str) -> bool {
    id.starts_with(SYNTHETIC_CALL_PREFIX)
}
