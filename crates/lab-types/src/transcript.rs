use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a transcript entry's author. Distinct from [`crate::message::Role`]:
/// this is the *thread* role (who spoke), not the *LLM wire* role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRole {
    Agent,
    Moderator,
    Summarizer,
    User,
    System,
}

/// One durable, never-mutated line in a thread's transcript.
///
/// Appended once per successful node turn. Rollback never deletes an entry;
/// it appends a marker entry instead (see [`Self::rollback_marker`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Strictly increasing within a thread.
    pub t: DateTime<Utc>,
    /// Non-decreasing within a thread.
    pub iter: u64,
    pub agent_id: String,
    pub role: EntryRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TranscriptEntry {
    pub fn new(iter: u64, agent_id: impl Into<String>, role: EntryRole, content: impl Into<String>) -> Self {
        Self {
            t: Utc::now(),
            iter,
            agent_id: agent_id.into(),
            role,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// A logical marker recording that `n` live entries were rolled back.
    /// The durable transcript keeps this marker in place of the removed
    /// entries; it never deletes them.
    pub fn rollback_marker(iter: u64, n: usize, clear_summaries: bool) -> Self {
        Self::new(iter, "moderator", EntryRole::System, format!("[rollback {n} entries]")).with_metadata(
            serde_json::json!({ "rollback": n, "clear_summaries": clear_summaries }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_marker_has_system_role() {
        let m = TranscriptEntry::rollback_marker(3, 2, true);
        assert_eq!(m.role, EntryRole::System);
        assert_eq!(m.content, "[rollback 2 entries]");
        assert_eq!(m.metadata.unwrap()["rollback"], 2);
    }

    #[test]
    fn entry_role_snake_case_serialization() {
        assert_eq!(serde_json::to_string(&EntryRole::Summarizer).unwrap(), "\"summarizer\"");
    }
}
