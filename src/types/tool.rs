use super::turn::{ToolCallRequest, ToolCallResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("tool host unavailable: {0}")]
    Unavailable(String),
    #[error("two or more tools are named `{0}`")]
    NameConflict(String),
}

#[async_trait]
pub trait ToolCatalog: Send + Sync {
    async fn list(&self) -> Result<Vec<ToolDescriptor>, CatalogError>;
}

/// Executes tools on behalf of the model.
///
/// Every failure (unknown tool, bad arguments, execution error) comes back as a
/// failed [`ToolCallResult`] so the model can react to it.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn call(&self, request: &ToolCallRequest) -> ToolCallResult;
}
