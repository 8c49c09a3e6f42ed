use std::collections::HashMap;
use std::sync::Arc;

use lab_types::{Error, Result};

use crate::traits::{Tool, ToolOutcome};

/// Looks tools up by name for the Agent node's tool-call loop.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Runs a tool by name, turning an unknown name into a `ToolOutcome`
    /// failure rather than a process error — the Agent node folds this
    /// straight back into the transcript as a failed tool result.
    pub async fn invoke(&self, name: &str, args: serde_json::Value) -> Result<ToolOutcome> {
        match self.get(name) {
            Some(tool) => tool.run(args).await,
            None => Err(Error::Tool(format!("unknown tool: {name}"))),
        }
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        async fn run(&self, args: serde_json::Value) -> Result<ToolOutcome> {
            Ok(ToolOutcome::success(args))
        }
        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn invokes_registered_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        let out = reg.invoke("echo", serde_json::json!({"x": 1})).await.unwrap();
        assert!(out.ok);
        assert_eq!(out.data.unwrap()["x"], 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_not_a_panic() {
        let reg = ToolRegistry::new();
        let err = reg.invoke("nope", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Tool(_)));
    }

    #[test]
    fn list_is_sorted() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool));
        assert_eq!(reg.list(), vec!["echo".to_string()]);
    }
}
