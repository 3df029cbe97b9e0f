use super::Tool;
use crate::types::ToolDescriptor;
use schemars::JsonSchema;
use schemars::schema::{Schema, SchemaObject};
use schemars::schema_for;
use serde::de::Deserialize;
use serde_json::Error as JsonError;
use serde_json::Value;
use thiserror::Error;

type Deserializer<C> =
    Box<dyn Fn(Value) -> Result<Box<dyn Tool<Context = C>>, JsonError> + Send + Sync>;

/// A registered tool: its advertised descriptor and a way to build a call from arguments.
pub struct ToolObject<C> {
    pub descriptor: ToolDescriptor,
    deserializer: Deserializer<C>,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("tool schema is missing a title or description")]
    MissingMetadata,
    #[error("could not convert schema to json")]
    JsonSerialization(JsonError),
}

impl<C> ToolObject<C> {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Absent arguments count as an empty object.
    pub fn try_deserialize(&self, arguments: Value) -> Result<Box<dyn Tool<Context = C>>, JsonError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        (self.deserializer)(arguments)
    }
}

impl<C: 'static> ToolObject<C> {
    pub fn try_from_tool<T>() -> Result<Self, ValidationError>
    where
        T: JsonSchema + Tool<Context = C> + for<'de> Deserialize<'de> + 'static,
    {
        let schema = schema_for!(T);

        let (name, description) = validate_tool_schema(&schema.schema)?;

        let parameters =
            serde_json::to_value(&schema).map_err(ValidationError::JsonSerialization)?;

        let deserializer = Box::new(|arguments: Value| {
            serde_json::from_value::<T>(arguments)
                .map(|tool| Box::new(tool) as Box<dyn Tool<Context = C>>)
        });

        Ok(Self {
            descriptor: ToolDescriptor::new(name, description, parameters),
            deserializer,
        })
    }
}

fn validate_tool_schema(schema: &SchemaObject) -> Result<(String, String), ValidationError> {
    let name = schema
        .metadata
        .as_deref()
        .and_then(|metadata| metadata.title.as_deref())
        .ok_or(ValidationError::MissingMetadata)?
        .to_string();

    let description = validate_tool_description(schema)?;
    Ok((name, description))
}

// every property must be described too, the model only sees the schema
fn validate_tool_description(schema: &SchemaObject) -> Result<String, ValidationError> {
    let description = schema
        .metadata
        .as_deref()
        .and_then(|metadata| metadata.description.as_deref())
        .ok_or(ValidationError::MissingMetadata)?;

    if let Some(object) = schema.object.as_deref() {
        for sub_schema in object.properties.values() {
            if let Schema::Object(sub_schema_object) = sub_schema {
                validate_tool_description(sub_schema_object)?;
            }
        }
    }

    Ok(description.to_string())
}
