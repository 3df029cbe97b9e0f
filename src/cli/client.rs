use super::io::PromptReader;

use anyhow::Result;
use toolchat::{
    ConversationState, LoopError, LoopObserver, Orchestrator, ToolCallRequest, ToolCallResult,
    TracingObserver,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

const QUIT: &str = "quit";

/// Interactive session: every prompt extends the transcript left by the previous one.
pub struct CliClient {
    orchestrator: Orchestrator,
    state: ConversationState,
}

impl CliClient {
    pub fn new(orchestrator: Orchestrator) -> CliClient {
        CliClient {
            orchestrator,
            state: ConversationState::new(),
        }
    }

    pub async fn chat(&mut self) -> Result<()> {
        let mut reader = PromptReader::new();
        loop {
            // ctrl-c at the prompt ends the session, during a prompt it cancels it
            let input = tokio::select! {
                input = reader.read_user_input() => input?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(input) = input else {
                break;
            };
            let prompt = input.trim();
            if prompt.is_empty() {
                continue;
            }
            if prompt == QUIT {
                break;
            }
            self.chat_response(prompt).await;
        }
        Ok(())
    }

    async fn chat_response(&mut self, prompt: &str) {
        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let outcome = self
            .orchestrator
            .run(self.state.clone(), prompt, &cancel)
            .await;
        interrupt.abort();

        match outcome {
            Ok(exchange) => self.state = exchange.state,
            Err(LoopError::Cancelled) => warn!("prompt cancelled, transcript unchanged"),
            Err(err) => error!("prompt failed: {err}"),
        }
    }
}

/// Prints tool calls and the answer to stdout, and traces as usual.
pub struct ConsoleObserver;

impl LoopObserver for ConsoleObserver {
    fn backend_call(&self, call: usize) {
        TracingObserver.backend_call(call);
    }

    fn tool_call(&self, request: &ToolCallRequest) {
        println!("[{}({})]", request.name, request.arguments);
        TracingObserver.tool_call(request);
    }

    fn tool_result(&self, request: &ToolCallRequest, result: &ToolCallResult) {
        TracingObserver.tool_result(request, result);
    }

    fn answer(&self, text: &str) {
        println!("{text}");
        TracingObserver.answer(text);
    }
}
