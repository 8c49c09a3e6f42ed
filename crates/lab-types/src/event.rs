use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted during conversation execution (spec.md §4.4, "Event
/// model"). One or more of these are produced per node turn; the Engine is
/// the sole producer, the Adapter fans them out to external consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ProviderResult { node_id: String, role: String, content_len: usize },
    ToolCall { node_id: String, tool_id: String, args: serde_json::Value },
    ToolResult { node_id: String, tool_id: String, ok: bool },
    ToolError { node_id: String, tool_id: String, message: String },
    NodeSkipped { node_id: String },
    IterationComplete { iter: u64 },
    ModeratorAction { action: String, rollback: u32 },
    RunComplete,
    Error { kind: String, message: String, #[serde(skip_serializing_if = "std::ops::Not::not")] fatal: bool },
    /// A user message observed at `post_user_message(immediate=true)`.
    UserMessage { content: String },
}

/// The envelope shape handed to adapter consumers (spec.md §6, "Event
/// payload").
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEvent {
    pub conversation_id: String,
    #[serde(flatten)]
    pub event: Event,
    pub timestamp: DateTime<Utc>,
    pub iteration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl ConversationEvent {
    pub fn new(conversation_id: impl Into<String>, iteration: u64, event: Event) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            event,
            timestamp: Utc::now(),
            iteration,
            agent_id: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

/// Correlates a `step()`/`run()` call across log lines — not a spec.md
/// entity, purely an observability aid (tracing span field).
pub fn new_run_id() -> Uuid {
    Uuid::new_v4()
}
