use crate::types::{ToolCallRequest, ToolCallResult};
use tracing::{debug, info, warn};

/// Receives what the loop does, in order. Every hook defaults to a no-op.
pub trait LoopObserver: Send + Sync {
    fn backend_call(&self, _call: usize) {}

    fn tool_call(&self, _request: &ToolCallRequest) {}

    fn tool_result(&self, _request: &ToolCallRequest, _result: &ToolCallResult) {}

    /// Text of the reply that ended the loop.
    fn answer(&self, _text: &str) {}
}

/// Reports through `tracing`: tool traffic at debug, the answer at info.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LoopObserver for TracingObserver {
    fn backend_call(&self, call: usize) {
        debug!(call, "calling backend");
    }

    fn tool_call(&self, request: &ToolCallRequest) {
        debug!(
            tool = %request.name,
            id = %request.id,
            arguments = %request.arguments,
            "calling tool"
        );
    }

    fn tool_result(&self, request: &ToolCallRequest, result: &ToolCallResult) {
        if result.success {
            debug!(tool = %request.name, payload = %result.payload, "tool returned");
        } else {
            warn!(tool = %request.name, payload = %result.payload, "tool call failed");
        }
    }

    fn answer(&self, text: &str) {
        info!(answer = %text, "final answer");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LoopObserver for NoopObserver {}
