use super::Counter;
use crate::host::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::fs::read_to_string;

#[derive(Deserialize, JsonSchema, Debug, Default)]
#[schemars(title = "read_files", description = "Read one or more files and return their contents")]
pub struct ReadFiles {
    #[schemars(description = "a list of relative file paths to read")]
    pub paths: Vec<String>,
}

impl Tool for ReadFiles {
    type Context = Counter;
    fn apply(&self, _: &Self::Context) -> Result<Value, String> {
        let contents = self
            .paths
            .iter()
            .map(|path| match read_to_string(path) {
                Ok(content) => format!("[{path}]\n{content}"),
                Err(_) => format!("[{path}]\n<failed to read file>"),
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Value::String(contents))
    }
}
