use crate::types::ToolDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A tool definition in the form a backend's function-calling API takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<FunctionSpec> for ToolDescriptor {
    fn from(spec: FunctionSpec) -> Self {
        ToolDescriptor::new(spec.name, spec.description, spec.parameters)
    }
}

pub trait SchemaAdapter: Send + Sync {
    fn adapt_schema(&self, schema: &Value) -> Value;

    fn adapt(&self, tools: &[ToolDescriptor]) -> Vec<FunctionSpec> {
        tools
            .iter()
            .map(|tool| FunctionSpec {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: self.adapt_schema(&tool.parameters),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSchema;

impl SchemaAdapter for PassthroughSchema {
    fn adapt_schema(&self, schema: &Value) -> Value {
        object_root(schema.clone())
    }
}

/// Chat-completions functions need an object root with `properties`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiSchema;

impl SchemaAdapter for OpenAiSchema {
    fn adapt_schema(&self, schema: &Value) -> Value {
        let mut root = object_root(schema.clone());
        if let Some(map) = root.as_object_mut() {
            map.entry("properties")
                .or_insert_with(|| Value::Object(Map::new()));
        }
        root
    }
}

/// Gemini takes an OpenAPI subset and fails on anything else, notably
/// `additionalProperties` and `$schema`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiSchema;

const GEMINI_KEYS: &[&str] = &[
    "type",
    "format",
    "title",
    "description",
    "nullable",
    "enum",
    "maxItems",
    "minItems",
    "properties",
    "required",
    "minProperties",
    "maxProperties",
    "minLength",
    "maxLength",
    "pattern",
    "example",
    "anyOf",
    "propertyOrdering",
    "default",
    "items",
    "minimum",
    "maximum",
];

impl SchemaAdapter for GeminiSchema {
    fn adapt_schema(&self, schema: &Value) -> Value {
        gemini_subschema(&object_root(schema.clone()))
    }
}

fn gemini_subschema(schema: &Value) -> Value {
    let Some(source) = schema.as_object() else {
        return schema.clone();
    };
    let mut adapted = Map::new();
    for (key, value) in source {
        if !GEMINI_KEYS.contains(&key.as_str()) {
            continue;
        }
        let value = match key.as_str() {
            "properties" => match value.as_object() {
                Some(props) => Value::Object(
                    props
                        .iter()
                        .map(|(name, sub)| (name.clone(), gemini_subschema(sub)))
                        .collect(),
                ),
                None => continue,
            },
            "items" => match value {
                Value::Array(items) => items.first().map(gemini_subschema).unwrap_or(json!({})),
                other => gemini_subschema(other),
            },
            "anyOf" => match value.as_array() {
                Some(options) => Value::Array(options.iter().map(gemini_subschema).collect()),
                None => continue,
            },
            // ["integer", "null"] is how optional fields are usually spelled
            "type" => match value.as_array() {
                Some(types) => {
                    if types.iter().any(|t| t == "null") {
                        adapted.insert("nullable".to_string(), Value::Bool(true));
                    }
                    match types.iter().find(|t| *t != "null") {
                        Some(first) => first.clone(),
                        None => continue,
                    }
                }
                None => value.clone(),
            },
            _ => value.clone(),
        };
        adapted.insert(key.clone(), value);
    }
    Value::Object(adapted)
}

fn object_root(schema: Value) -> Value {
    match schema {
        Value::Object(mut map) => {
            map.entry("type").or_insert_with(|| json!("object"));
            Value::Object(map)
        }
        _ => json!({"type": "object", "properties": {}}),
    }
}
