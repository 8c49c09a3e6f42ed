use serde::{Deserialize, Serialize};

/// The moderator's per-turn decision, parsed once from its JSON-only output.
///
/// Represented as a sum type rather than a flat struct with an `action`
/// string so the Engine can `match` on it exhaustively instead of branching
/// on string comparisons.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeratorAction {
    Continue,
    Stop,
    Rollback { n: u32, clear_summaries: bool },
    ClearSummaries,
}

/// Wire shape of a moderator turn's JSON output (spec.md §3, "Moderator
/// Action"). `ModeratorRecord::into_action` converts this into the typed
/// sum above; the raw fields stay around for transcript metadata and for
/// surfacing `summary`/`drift`/`citations` to consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeratorRecord {
    pub summary: String,
    #[serde(default)]
    pub drift: f32,
    pub action: ModeratorActionTag,
    #[serde(default)]
    pub rollback: u32,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub clear_summaries: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModeratorActionTag {
    Continue,
    Stop,
    Rollback,
    ClearSummaries,
}

impl ModeratorRecord {
    /// Parse a moderator's raw JSON-only output. Malformed JSON or a
    /// `drift` outside `[0, 1]` is a [`crate::error::Error::ContractViolation`].
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let record: ModeratorRecord = serde_json::from_str(raw)
            .map_err(|e| crate::error::Error::ContractViolation(format!("malformed moderator output: {e}")))?;
        if !(0.0..=1.0).contains(&record.drift) {
            return Err(crate::error::Error::ContractViolation(format!(
                "moderator drift {} out of range [0, 1]",
                record.drift
            )));
        }
        Ok(record)
    }

    pub fn into_action(self) -> ModeratorAction {
        match self.action {
            ModeratorActionTag::Continue => ModeratorAction::Continue,
            ModeratorActionTag::Stop => ModeratorAction::Stop,
            ModeratorActionTag::ClearSummaries => ModeratorAction::ClearSummaries,
            ModeratorActionTag::Rollback => ModeratorAction::Rollback {
                n: self.rollback,
                clear_summaries: self.clear_summaries,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_continue() {
        let r = ModeratorRecord::parse(r#"{"summary":"ok","drift":0.1,"action":"CONTINUE"}"#).unwrap();
        assert_eq!(r.into_action(), ModeratorAction::Continue);
    }

    #[test]
    fn parses_rollback_with_fields() {
        let r = ModeratorRecord::parse(
            r#"{"summary":"drifted","drift":0.8,"action":"ROLLBACK","rollback":2,"clear_summaries":true}"#,
        )
        .unwrap();
        assert_eq!(
            r.into_action(),
            ModeratorAction::Rollback { n: 2, clear_summaries: true }
        );
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ModeratorRecord::parse("not json").unwrap_err();
        assert!(matches!(err, crate::error::Error::ContractViolation(_)));
    }

    #[test]
    fn rejects_drift_out_of_range() {
        let err = ModeratorRecord::parse(r#"{"summary":"x","drift":1.5,"action":"CONTINUE"}"#).unwrap_err();
        assert!(matches!(err, crate::error::Error::ContractViolation(_)));
    }

    #[test]
    fn missing_rollback_defaults_zero() {
        let r = ModeratorRecord::parse(r#"{"summary":"x","drift":0,"action":"STOP"}"#).unwrap();
        assert_eq!(r.rollback, 0);
        assert_eq!(r.into_action(), ModeratorAction::Stop);
    }
}
