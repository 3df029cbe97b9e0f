mod state;
mod tool;
mod toolset;
mod turn;

pub use state::{ConversationState, TranscriptError};
pub use tool::{CatalogError, ToolCatalog, ToolDescriptor, ToolInvoker};
pub use toolset::ToolSet;
pub use turn::{
    ContentBlock, Role, ToolCallRequest, ToolCallResult, Turn, is_synthetic_call_id,
    synthetic_call_id,
};
