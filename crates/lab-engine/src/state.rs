use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use lab_types::budget::{BudgetDenyReason, ToolBudget, ToolUsage};
use lab_types::message::{Message, Role};
use lab_types::transcript::{EntryRole, TranscriptEntry};

use crate::preset::Preset;

/// The per-thread mutable object (spec.md §4.1, "Conversation State").
///
/// Owned exclusively by its Engine for the thread's active lifetime; no
/// other code mutates it. The engine's single-threaded loop is what makes
/// plain owned fields (no locks) correct here.
pub struct ConversationState {
    pub iter: u64,
    pub stop_flag: bool,
    pub running_summary: Option<String>,
    pub objective: String,
    pub contract_violations: u32,

    history: VecDeque<TranscriptEntry>,
    history_cap: usize,

    user_queues: HashMap<String, VecDeque<(String, String)>>,

    budgets: HashMap<String, ToolBudget>,
    usage: ToolUsage,
}

/// Structured snapshot written at each `iteration_complete` (spec.md §4.5).
/// Deliberately excludes anything opaque — every field is named and typed,
/// so a `_pickled`-style blob can never be produced by this implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub iter: u64,
    pub stop_flag: bool,
    pub running_summary: Option<String>,
    pub objective: String,
    pub contract_violations: u32,
    pub history: Vec<TranscriptEntry>,
    pub per_run_usage: HashMap<String, u32>,
}

impl ConversationState {
    pub fn new(preset: &Preset, history_cap: usize) -> Self {
        let budgets = preset.tools.iter().map(|t| (t.id.clone(), t.budget)).collect();
        Self {
            iter: 0,
            stop_flag: false,
            running_summary: None,
            objective: preset.objective.clone(),
            contract_violations: 0,
            history: VecDeque::new(),
            history_cap,
            user_queues: HashMap::new(),
            budgets,
            usage: ToolUsage::new(),
        }
    }

    pub fn from_snapshot(preset: &Preset, history_cap: usize, snapshot: StateSnapshot) -> Self {
        let budgets = preset.tools.iter().map(|t| (t.id.clone(), t.budget)).collect();
        let mut usage = ToolUsage::new();
        for (tool_id, count) in snapshot.per_run_usage {
            for _ in 0..count {
                usage.record(&tool_id);
            }
        }
        Self {
            iter: snapshot.iter,
            stop_flag: snapshot.stop_flag,
            running_summary: snapshot.running_summary,
            objective: snapshot.objective,
            contract_violations: snapshot.contract_violations,
            history: snapshot.history.into(),
            history_cap,
            user_queues: HashMap::new(),
            budgets,
            usage,
        }
    }

    pub fn to_snapshot(&self) -> StateSnapshot {
        let mut per_run_usage = HashMap::new();
        for tool_id in self.budgets.keys() {
            let n = self.usage.per_run_calls(tool_id);
            if n > 0 {
                per_run_usage.insert(tool_id.clone(), n);
            }
        }
        StateSnapshot {
            iter: self.iter,
            stop_flag: self.stop_flag,
            running_summary: self.running_summary.clone(),
            objective: self.objective.clone(),
            contract_violations: self.contract_violations,
            history: self.history.iter().cloned().collect(),
            per_run_usage,
        }
    }

    /// Composes the provider-facing message window: the system prompt
    /// followed by a bounded suffix of transcript entries, mapped
    /// agent/moderator/summarizer -> assistant, user -> user (spec.md
    /// §4.1, "Composition rule").
    pub fn compose_messages(&self, system_prompt: &str, window: usize) -> Vec<Message> {
        let mut messages = vec![Message::system(system_prompt)];
        let start = self.history.len().saturating_sub(window);
        for entry in self.history.iter().skip(start) {
            let role = match entry.role {
                EntryRole::User => Role::User,
                _ => Role::Assistant,
            };
            messages.push(Message { role, content: entry.content.clone() });
        }
        messages
    }

    /// Appends to the live in-memory window only. Durable persistence is
    /// the Engine's job (it owns the Store).
    pub fn append_message(&mut self, entry: TranscriptEntry) {
        self.history.push_back(entry);
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    /// Returns a read-only copy of the live window, most-recent-last.
    pub fn history_window(&self, limit: Option<usize>) -> Vec<TranscriptEntry> {
        match limit {
            Some(n) => {
                let start = self.history.len().saturating_sub(n);
                self.history.iter().skip(start).cloned().collect()
            }
            None => self.history.iter().cloned().collect(),
        }
    }

    /// Removes the last `n` entries from the live window. The durable
    /// transcript is untouched — the Engine appends a rollback marker
    /// there instead of deleting anything.
    pub fn rollback(&mut self, n: u32, clear_summaries: bool) {
        for _ in 0..n {
            if self.history.pop_back().is_none() {
                break;
            }
        }
        if clear_summaries {
            self.running_summary = None;
        }
    }

    pub fn pop_user_input(&mut self, user_node_id: &str) -> Option<(String, String)> {
        self.user_queues.get_mut(user_node_id).and_then(|q| q.pop_front())
    }

    pub fn push_user_input(&mut self, user_node_id: &str, content: impl Into<String>, user_id: impl Into<String>) {
        self.user_queues.entry(user_node_id.to_string()).or_default().push_back((content.into(), user_id.into()));
    }

    pub fn can_call_tool(&self, tool_id: &str) -> Result<(), BudgetDenyReason> {
        let budget = self.budgets.get(tool_id).copied().unwrap_or(ToolBudget { per_run_max: 0, per_iteration_max: 0 });
        self.usage.check(tool_id, &budget)
    }

    pub fn record_tool_call(&mut self, tool_id: &str) {
        self.usage.record(tool_id);
    }

    pub fn get_tool_budgets(&self) -> &HashMap<String, ToolBudget> {
        &self.budgets
    }

    pub fn get_tool_usage_stats(&self) -> &ToolUsage {
        &self.usage
    }

    /// Called by the Engine at each new-iteration boundary.
    pub fn reset_iteration_counters(&mut self) {
        self.usage.reset_iteration();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_types::transcript::EntryRole;

    fn preset() -> Preset {
        Preset {
            objective: "test".into(),
            nodes: vec![],
            turn_plan: HashMap::new(),
            tools: vec![],
            max_contract_violations: 3,
        }
    }

    #[test]
    fn compose_messages_maps_roles_and_respects_window() {
        let mut state = ConversationState::new(&preset(), 50);
        for i in 0..3 {
            state.append_message(TranscriptEntry::new(0, "agent-1", EntryRole::Agent, format!("a{i}")));
        }
        state.append_message(TranscriptEntry::new(0, "user:alice", EntryRole::User, "hi"));
        let messages = state.compose_messages("sys", 2);
        assert_eq!(messages.len(), 3); // system + last 2
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "a2");
        assert_eq!(messages[2].role, Role::User);
    }

    #[test]
    fn rollback_shrinks_live_window_only() {
        let mut state = ConversationState::new(&preset(), 50);
        for i in 0..3 {
            state.append_message(TranscriptEntry::new(0, "agent-1", EntryRole::Agent, format!("a{i}")));
        }
        state.rollback(1, false);
        assert_eq!(state.history_window(None).len(), 2);
    }

    #[test]
    fn rollback_with_clear_summaries_clears_summary() {
        let mut state = ConversationState::new(&preset(), 50);
        state.running_summary = Some("so far".into());
        state.rollback(0, true);
        assert!(state.running_summary.is_none());
    }

    #[test]
    fn user_queue_is_fifo_per_node() {
        let mut state = ConversationState::new(&preset(), 50);
        state.push_user_input("user:alice", "first", "alice");
        state.push_user_input("user:alice", "second", "alice");
        assert_eq!(state.pop_user_input("user:alice").unwrap().0, "first");
        assert_eq!(state.pop_user_input("user:alice").unwrap().0, "second");
        assert!(state.pop_user_input("user:alice").is_none());
    }

    #[test]
    fn history_cap_evicts_oldest() {
        let mut state = ConversationState::new(&preset(), 2);
        for i in 0..5 {
            state.append_message(TranscriptEntry::new(0, "agent-1", EntryRole::Agent, format!("a{i}")));
        }
        let window = state.history_window(None);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "a3");
    }

    #[test]
    fn snapshot_round_trip_preserves_usage_and_iter() {
        let mut state = ConversationState::new(&preset(), 50);
        state.iter = 4;
        state.budgets.insert("ddg".into(), ToolBudget { per_run_max: 5, per_iteration_max: 5 });
        state.record_tool_call("ddg");
        let snap = state.to_snapshot();
        let restored = ConversationState::from_snapshot(&preset(), 50, snap);
        assert_eq!(restored.iter, 4);
        assert_eq!(restored.usage.per_run_calls("ddg"), 1);
    }
}
