use parking_lot::Mutex;

use lab_types::Result;

use crate::traits::{Tool, ToolOutcome};

/// Scripted test double, mirroring `lab_providers::FakeProvider`: returns
/// queued outcomes in order and records every invocation for assertions.
pub struct FakeTool {
    name: String,
    script: Mutex<Vec<ToolOutcome>>,
    calls: Mutex<Vec<serde_json::Value>>,
}

impl FakeTool {
    pub fn new(name: impl Into<String>, script: Vec<ToolOutcome>) -> Self {
        Self { name: name.into(), script: Mutex::new(script), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<serde_json::Value> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl Tool for FakeTool {
    async fn run(&self, args: serde_json::Value) -> Result<ToolOutcome> {
        self.calls.lock().push(args);
        let mut script = self.script.lock();
        if script.is_empty() {
            return Ok(ToolOutcome::failure(format!("FakeTool {} script exhausted", self.name)));
        }
        Ok(script.remove(0))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_scripted_outcomes_in_order() {
        let tool = FakeTool::new("search", vec![ToolOutcome::success(serde_json::json!(1)), ToolOutcome::failure("rate limited")]);
        let a = tool.run(serde_json::json!({})).await.unwrap();
        let b = tool.run(serde_json::json!({})).await.unwrap();
        assert!(a.ok);
        assert!(!b.ok);
        assert_eq!(tool.calls().len(), 2);
    }
}
