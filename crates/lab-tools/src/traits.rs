use lab_types::Result;

/// A single tool call as the Agent node issues it (spec.md §4.3, "Tool
/// Budget" entity refers to these by `tool_id`).
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool_id: String,
    pub args: serde_json::Value,
}

/// What a tool run produces. `error` is set instead of the call returning
/// `Err` for anything the tool itself reports as a failure (bad input,
/// remote 4xx) — those are contract-shaped failures the Agent node folds
/// back into the conversation, not process-level errors.
#[derive(Debug, Clone, Default)]
pub struct ToolOutcome {
    pub ok: bool,
    pub data: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(data: serde_json::Value) -> Self {
        Self { ok: true, data: Some(data), metadata: None, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, data: None, metadata: None, error: Some(error.into()) }
    }
}

/// Trait every tool implements. A `run` that returns `Err` means the tool
/// infrastructure itself failed (timeout, process crash); a tool that ran
/// but disagreed with its input reports that through [`ToolOutcome::failure`]
/// instead.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    async fn run(&self, args: serde_json::Value) -> Result<ToolOutcome>;

    fn name(&self) -> &str;
}
