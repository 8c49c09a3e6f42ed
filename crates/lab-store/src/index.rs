use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Row returned by [`crate::Store::list_threads`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub preset_ref: String,
    pub updated_at: DateTime<Utc>,
}

/// On-disk index of every thread the store has seen, so `list_threads`
/// doesn't have to scan the transcript directory on every call.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Index {
    pub threads: HashMap<String, ThreadSummary>,
}

impl Index {
    pub(crate) fn upsert(&mut self, thread_id: &str, preset_ref: &str) {
        let now = Utc::now();
        self.threads
            .entry(thread_id.to_string())
            .and_modify(|s| {
                s.updated_at = now;
            })
            .or_insert_with(|| ThreadSummary {
                thread_id: thread_id.to_string(),
                preset_ref: preset_ref.to_string(),
                updated_at: now,
            });
    }

    pub(crate) fn list(&self, preset_ref: Option<&str>) -> Vec<ThreadSummary> {
        let mut rows: Vec<ThreadSummary> = self
            .threads
            .values()
            .filter(|s| match preset_ref {
                Some(p) => s.preset_ref == p,
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows
    }
}
