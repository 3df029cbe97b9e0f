use super::Counter;
use crate::host::Tool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[schemars(title = "list_files", description = "list the files in a directory")]
pub struct ListFiles {
    #[schemars(description = "directory to list, defaults to the working directory")]
    #[serde(default)]
    pub path: Option<String>,
}

impl Tool for ListFiles {
    type Context = Counter;
    fn apply(&self, _: &Self::Context) -> Result<Value, String> {
        let path = self.path.as_deref().unwrap_or(".");
        let contents =
            std::fs::read_dir(path).map_err(|err| format!("could not list {path}: {err}"))?;
        let mut names: Vec<String> = contents
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        Ok(json!(names))
    }
}
