use super::turn::{ContentBlock, Role, ToolCallRequest, Turn};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("tool result answers unknown call `{0}`")]
    UnknownCall(String),
    #[error("call `{0}` was already answered")]
    AlreadyAnswered(String),
    #[error("call id `{0}` appears twice in one assistant turn")]
    DuplicateCallId(String),
    #[error("{0:?} turn carries a block it cannot hold")]
    RoleMismatch(Role),
}

/// Cloning is cheap and clones are independent: `append` copies the turn list
/// only when another clone still shares it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    turns: Arc<Vec<Turn>>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(mut self, turn: Turn) -> Result<Self, TranscriptError> {
        self.check(&turn)?;
        Arc::make_mut(&mut self.turns).push(turn);
        Ok(self)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Requests that no tool-result turn has answered yet, in transcript order.
    ///
    /// A result answers the earliest open request with its id, so an id reused
    /// by a later assistant turn opens a new request.
    pub fn pending_calls(&self) -> Vec<&ToolCallRequest> {
        let mut pending: Vec<&ToolCallRequest> = vec![];
        for turn in self.turns.iter() {
            pending.extend(turn.tool_requests());
            for result in turn.tool_results() {
                if let Some(index) = pending.iter().position(|r| r.id == result.call_id) {
                    pending.remove(index);
                }
            }
        }
        pending
    }

    pub fn is_settled(&self) -> bool {
        self.pending_calls().is_empty()
    }

    fn check(&self, turn: &Turn) -> Result<(), TranscriptError> {
        let allowed = |block: &ContentBlock| match turn.role() {
            Role::User => matches!(block, ContentBlock::Text { .. }),
            Role::Assistant => !matches!(block, ContentBlock::ToolResult(_)),
            Role::ToolResult => matches!(block, ContentBlock::ToolResult(_)),
        };
        if !turn.blocks().iter().all(allowed) {
            return Err(TranscriptError::RoleMismatch(turn.role()));
        }

        match turn.role() {
            Role::User => Ok(()),
            Role::Assistant => {
                let mut seen = HashSet::new();
                for request in turn.tool_requests() {
                    if !seen.insert(request.id.as_str()) {
                        return Err(TranscriptError::DuplicateCallId(request.id.clone()));
                    }
                }
                Ok(())
            }
            Role::ToolResult => {
                let mut pending: Vec<&str> = self
                    .pending_calls()
                    .into_iter()
                    .map(|request| request.id.as_str())
                    .collect();
                for result in turn.tool_results() {
                    let id = result.call_id.as_str();
                    match pending.iter().position(|open| *open == id) {
                        Some(index) => {
                            pending.remove(index);
                        }
                        None => {
                            let requested = self
                                .turns
                                .iter()
                                .flat_map(Turn::tool_requests)
                                .any(|request| request.id == id);
                            return Err(if requested {
                                TranscriptError::AlreadyAnswered(id.to_string())
                            } else {
                                TranscriptError::UnknownCall(id.to_string())
                            });
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
