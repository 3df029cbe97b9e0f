use crate::backend::{BackendError, LlmBackend};
use crate::observer::{LoopObserver, TracingObserver};
use crate::schema::FunctionSpec;
use crate::types::{
    ConversationState, ToolCallRequest, ToolCallResult, ToolInvoker, ToolSet, TranscriptError,
    Turn,
};

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("no final answer after {0} backend calls")]
    LoopLimitExceeded(usize),
    #[error("cancelled")]
    Cancelled,
    #[error("transcript invariant violated: {0}")]
    Transcript(#[from] TranscriptError),
}

/// Result of one prompt.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Seed for the next prompt of the session.
    pub state: ConversationState,
    pub answer: String,
    pub backend_calls: usize,
}

pub struct Orchestrator {
    backend: Arc<dyn LlmBackend>,
    functions: Vec<FunctionSpec>,
    invoker: Arc<dyn ToolInvoker>,
    max_turns: Option<usize>,
    observer: Arc<dyn LoopObserver>,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        tools: ToolSet,
        invoker: Arc<dyn ToolInvoker>,
    ) -> Self {
        let functions = backend.schema_adapter().adapt(tools.descriptors());
        Self {
            backend,
            functions,
            invoker,
            max_turns: None,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Caps backend calls per prompt.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LoopObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Runs `prompt` against `state` and returns the extended transcript.
    ///
    /// On error nothing of this prompt is kept: the caller still holds `state`
    /// as it was. Cancellation is honoured between iterations and while waiting
    /// on the backend; a batch of tool calls always runs to completion.
    pub async fn run(
        &self,
        state: ConversationState,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Exchange, LoopError> {
        let mut state = state.append(Turn::user(prompt))?;
        let mut backend_calls = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(LoopError::Cancelled);
            }
            if let Some(max) = self.max_turns {
                if backend_calls >= max {
                    return Err(LoopError::LoopLimitExceeded(max));
                }
            }

            backend_calls += 1;
            self.observer.backend_call(backend_calls);
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LoopError::Cancelled),
                response = self.backend.generate(state.turns(), &self.functions) => response?,
            };
            debug!(
                backend = self.backend.name(),
                stop_reason = response.stop_reason.as_deref().unwrap_or("none"),
                blocks = response.blocks.len(),
                "backend replied"
            );
            let assistant = Turn::assistant(response.blocks);

            if !assistant.has_tool_requests() {
                let answer = assistant.text();
                state = state.append(assistant)?;
                self.observer.answer(&answer);
                return Ok(Exchange {
                    state,
                    answer,
                    backend_calls,
                });
            }

            let mut results = vec![];
            for request in assistant.tool_requests() {
                results.push(self.invoke(request).await);
            }

            state = state.append(assistant)?;
            for result in results {
                state = state.append(Turn::tool_result(result))?;
            }
        }
    }

    async fn invoke(&self, request: &ToolCallRequest) -> ToolCallResult {
        self.observer.tool_call(request);
        let result = if request.name.trim().is_empty() {
            ToolCallResult::failure(&request.id, "malformed tool call: no tool name given")
        } else if let Value::String(raw) = &request.arguments {
            ToolCallResult::failure(
                &request.id,
                format!("malformed tool call: arguments are not a JSON object: {raw}"),
            )
        } else {
            let result = self.invoker.call(request).await;
            ToolCallResult {
                call_id: request.id.clone(),
                ..result
            }
        };
        self.observer.tool_result(request, &result);
        result
    }
}
