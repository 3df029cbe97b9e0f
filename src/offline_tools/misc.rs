use super::Counter;
use crate::host::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[schemars(title = "say_hello", description = "Say hello to the client")]
pub struct SayHello {}

impl Tool for SayHello {
    type Context = Counter;
    fn apply(&self, _: &Counter) -> Result<Value, String> {
        Ok(json!("Bonjour!"))
    }
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[schemars(title = "today_weather", description = "Get today weather")]
pub struct TodayWeather {}

impl Tool for TodayWeather {
    type Context = Counter;
    fn apply(&self, _: &Counter) -> Result<Value, String> {
        Ok(json!("Rainy"))
    }
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[schemars(title = "echo", description = "Repeat what you say")]
pub struct Echo {
    #[schemars(description = "Repeat what you say")]
    pub saying: String,
}

impl Tool for Echo {
    type Context = Counter;
    fn apply(&self, _: &Counter) -> Result<Value, String> {
        Ok(json!(self.saying))
    }
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[schemars(title = "sum", description = "Calculate the sum of two numbers")]
pub struct Sum {
    #[schemars(description = "first addend")]
    pub a: i32,
    #[schemars(description = "second addend")]
    pub b: i32,
}

impl Tool for Sum {
    type Context = Counter;
    fn apply(&self, _: &Counter) -> Result<Value, String> {
        self.a
            .checked_add(self.b)
            .map(|total| json!(total.to_string()))
            .ok_or_else(|| format!("{} + {} overflows", self.a, self.b))
    }
}
