use serde::{Deserialize, Serialize};

/// A durable snapshot of engine state for one thread, keyed opaquely to the
/// store (the engine decides what goes in it).
///
/// A snapshot containing a top-level `_pickled` key is a marker for an
/// opaque blob dump (the kind a previous, incompatible engine version might
/// have left behind). The store refuses to persist or return these: they
/// are not resumable, and silently handing one back to the engine would
/// surface as a confusing deserialization failure several calls later
/// instead of a clear error now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot(pub serde_json::Value);

impl Snapshot {
    pub fn is_opaque(&self) -> bool {
        self.0.get("_pickled").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pickled_marker() {
        let s = Snapshot(serde_json::json!({ "_pickled": true, "blob": "..." }));
        assert!(s.is_opaque());
    }

    #[test]
    fn plain_snapshot_is_not_opaque() {
        let s = Snapshot(serde_json::json!({ "iter": 4, "running_summary": "..." }));
        assert!(!s.is_opaque());
    }
}
