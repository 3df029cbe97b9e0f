mod tool_object;

pub use tool_object::ValidationError;

use crate::types::{
    CatalogError, ToolCallRequest, ToolCallResult, ToolCatalog, ToolDescriptor, ToolInvoker,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tool_object::ToolObject;

pub trait Tool {
    type Context;
    fn apply(&self, context: &Self::Context) -> Result<Value, String>;
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("error validating schema")]
    Validation(#[from] ValidationError),
    #[error("two or more tools are named `{0}`")]
    NameConflict(String),
}

pub struct LocalToolHost<C> {
    tools: Vec<ToolObject<C>>,
    context: C,
}

impl<C: 'static> LocalToolHost<C> {
    pub fn new(context: C) -> Self {
        Self {
            tools: vec![],
            context,
        }
    }

    pub fn add_tool<T>(mut self) -> Result<Self, RegistrationError>
    where
        T: JsonSchema + Tool<Context = C> + for<'de> Deserialize<'de> + 'static,
    {
        let tool_object = ToolObject::try_from_tool::<T>()?;
        if self.tools.iter().any(|tool| tool.name() == tool_object.name()) {
            Err(RegistrationError::NameConflict(tool_object.name().to_string()))
        } else {
            self.tools.push(tool_object);
            Ok(self)
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor.clone()).collect()
    }

    fn try_tool_call(&self, name: &str, arguments: Value) -> Result<Value, String> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| format!("tool `{name}` not in toolset"))?;
        let call = tool
            .try_deserialize(arguments)
            .map_err(|err| format!("error deserializing tool call (possible hallucination): {err}"))?;
        call.apply(&self.context)
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> ToolCatalog for LocalToolHost<C> {
    async fn list(&self) -> Result<Vec<ToolDescriptor>, CatalogError> {
        Ok(self.descriptors())
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> ToolInvoker for LocalToolHost<C> {
    async fn call(&self, request: &ToolCallRequest) -> ToolCallResult {
        match self.try_tool_call(&request.name, request.arguments.clone()) {
            Ok(payload) => ToolCallResult::success(&request.id, payload),
            Err(message) => ToolCallResult::failure(&request.id, message),
        }
    }
}
