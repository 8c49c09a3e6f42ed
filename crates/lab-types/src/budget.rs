use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Static per-tool caps, configured once per preset (spec.md §3, "Tool Budget").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToolBudget {
    pub per_run_max: u32,
    pub per_iteration_max: u32,
}

/// Why a tool call was refused by [`crate::budget::ToolUsage::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDenyReason {
    PerIterationExceeded,
    PerRunExceeded,
}

impl std::fmt::Display for BudgetDenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PerIterationExceeded => "per_iteration_max exceeded",
            Self::PerRunExceeded => "per_run_max exceeded",
        };
        f.write_str(s)
    }
}

/// Live counters tracked in [`crate::state`]'s owning State object.
///
/// Two independent counter maps mirror the two budget dimensions: calls
/// made this iteration (reset at iteration boundaries) and calls made over
/// the life of the run (never reset).
#[derive(Debug, Clone, Default)]
pub struct ToolUsage {
    per_run: HashMap<String, u32>,
    per_iteration: HashMap<String, u32>,
}

impl ToolUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admissible iff both counters would remain within their max after
    /// one more call. Does not mutate; call [`Self::record`] on success.
    pub fn check(&self, tool_id: &str, budget: &ToolBudget) -> Result<(), BudgetDenyReason> {
        let iter_used = self.per_iteration.get(tool_id).copied().unwrap_or(0);
        if iter_used + 1 > budget.per_iteration_max {
            return Err(BudgetDenyReason::PerIterationExceeded);
        }
        let run_used = self.per_run.get(tool_id).copied().unwrap_or(0);
        if run_used + 1 > budget.per_run_max {
            return Err(BudgetDenyReason::PerRunExceeded);
        }
        Ok(())
    }

    pub fn record(&mut self, tool_id: &str) {
        *self.per_iteration.entry(tool_id.to_string()).or_insert(0) += 1;
        *self.per_run.entry(tool_id.to_string()).or_insert(0) += 1;
    }

    /// Reset per-iteration counters. Called by the Engine at each new
    /// iteration boundary; per-run counters persist for the life of the
    /// thread's live State.
    pub fn reset_iteration(&mut self) {
        self.per_iteration.clear();
    }

    pub fn per_iteration_calls(&self, tool_id: &str) -> u32 {
        self.per_iteration.get(tool_id).copied().unwrap_or(0)
    }

    pub fn per_run_calls(&self, tool_id: &str) -> u32 {
        self.per_run.get(tool_id).copied().unwrap_or(0)
    }
}
