use serde::{Deserialize, Serialize};

use crate::transcript::EntryRole;

/// What a node's `execute` call produces for the Engine to fold into State.
///
/// A `NodeOutput` only ever represents a turn that actually produced
/// content. A User node with an empty input queue does not construct one
/// at all — it returns `NodeTurnResult::Skipped` instead, a separate
/// variant the Engine checks for directly rather than inferring from an
/// empty `content` string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutput {
    pub role: EntryRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderator_action: Option<crate::moderator::ModeratorRecord>,
}

impl NodeOutput {
    pub fn new(role: EntryRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), metadata: None, moderator_action: None }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
