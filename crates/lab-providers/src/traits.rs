use std::time::Duration;

use lab_types::message::{Message, ToolCall, ToolSchema};
use lab_types::Result;

/// A provider-agnostic chat completion request (spec.md §6, "Provider
/// interface"). `tools` is empty for nodes that never call tools.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub model: Option<String>,
    pub json_mode: bool,
    /// Per-call timeout; `None` defers to the provider's own default.
    pub timeout: Option<Duration>,
}

/// A provider-agnostic chat completion response.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub model: String,
    pub metadata: Option<serde_json::Value>,
}

/// Trait every LLM adapter implements. Concrete adapters (translating to
/// an actual provider's wire format) live outside this crate; this is only
/// the seam the engine calls through.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
