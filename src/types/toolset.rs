use super::tool::{CatalogError, ToolCatalog, ToolDescriptor};
use std::collections::HashSet;
use std::sync::Arc;

/// Read-only snapshot of a host's tools, taken once per session.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: Arc<[ToolDescriptor]>,
}

impl ToolSet {
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        for tool in &tools {
            if !names.insert(tool.name.as_str()) {
                return Err(CatalogError::NameConflict(tool.name.clone()));
            }
        }
        Ok(Self {
            tools: tools.into(),
        })
    }

    pub async fn fetch(catalog: &dyn ToolCatalog) -> Result<Self, CatalogError> {
        Self::new(catalog.list().await?)
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicate_names_conflict() {
        let tools = vec![
            ToolDescriptor::new("echo", "a", json!({})),
            ToolDescriptor::new("echo", "b", json!({})),
        ];
        match ToolSet::new(tools) {
            Err(CatalogError::NameConflict(name)) => assert_eq!(name, "echo"),
            other => panic!("expected name conflict, got {other:?}"),
        }
    }

    #[test]
    fn lookup_by_name() {
        let set = ToolSet::new(vec![
            ToolDescriptor::new("increment", "add one", json!({"type": "object"})),
            ToolDescriptor::new("sum", "add two numbers", json!({"type": "object"})),
        ])
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("sum").unwrap().description, "add two numbers");
        assert!(set.get("missing").is_none());
        assert_eq!(set.names(), vec!["increment", "sum"]);
    }
}
