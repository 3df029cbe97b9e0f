mod local;
mod mcp;

pub use local::{LocalToolHost, RegistrationError, Tool, ValidationError};
pub use mcp::{McpToolHost, McpTransport};
