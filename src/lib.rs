//! A chat client that lets an LLM call tools served by an MCP host.

pub mod backend;
pub mod host;
pub mod observer;
pub mod offline_tools;
pub mod orchestrator;
pub mod schema;
pub mod types;

pub use backend::{BackendError, BackendResponse, LlmBackend};
pub use observer::{LoopObserver, NoopObserver, TracingObserver};
pub use orchestrator::{Exchange, LoopError, Orchestrator};
pub use schema::{FunctionSpec, SchemaAdapter};
pub use types::{
    CatalogError, ContentBlock, ConversationState, Role, ToolCallRequest, ToolCallResult,
    ToolCatalog, ToolDescriptor, ToolInvoker, ToolSet, Turn,
};
