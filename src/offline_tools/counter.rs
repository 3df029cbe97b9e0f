use super::Counter;
use crate::host::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[schemars(
    title = "increment",
    description = "Increment the counter by 1 and get the value of counter after increment"
)]
pub struct Increment {}

impl Tool for Increment {
    type Context = Counter;
    fn apply(&self, counter: &Counter) -> Result<Value, String> {
        Ok(json!(counter.add(1).to_string()))
    }
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[schemars(
    title = "decrement",
    description = "Decrement the counter by 1, and get the value of counter after decrement"
)]
pub struct Decrement {}

impl Tool for Decrement {
    type Context = Counter;
    fn apply(&self, counter: &Counter) -> Result<Value, String> {
        Ok(json!(counter.add(-1).to_string()))
    }
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[schemars(title = "get_value", description = "Get the current counter value")]
pub struct GetValue {}

impl Tool for GetValue {
    type Context = Counter;
    fn apply(&self, counter: &Counter) -> Result<Value, String> {
        Ok(json!(counter.get().to_string()))
    }
}
