use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one conversation lifetime (spec.md §3, "Thread"). Stable for
/// the life of the conversation; every transcript entry shares it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMeta {
    pub thread_id: String,
    pub preset_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadMeta {
    pub fn new(thread_id: impl Into<String>, preset_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { thread_id: thread_id.into(), preset_ref: preset_ref.into(), created_at: now, updated_at: now }
    }
}
