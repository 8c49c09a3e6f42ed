use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lab_types::budget::ToolBudget;
use lab_types::message::ToolSchema;

/// A fully-parsed preset document (spec.md §6, "Preset document").
///
/// Loading and validating the *external* document (TOML/YAML, whatever the
/// caller's loader produces) is out of scope here — `Preset` is the
/// already-resolved shape the Engine consumes. `lab-cli` is responsible for
/// turning a file on disk into one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub objective: String,
    /// Declared order matters: it breaks scheduler ties within an
    /// iteration (spec.md §4.3).
    pub nodes: Vec<NodeSpec>,
    /// `node_id -> cadence`. A node fires on iteration `i` iff
    /// `i % cadence == 0`. Missing entries default to cadence 1 (every
    /// iteration).
    #[serde(default)]
    pub turn_plan: HashMap<String, u64>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Moderator contract violations beyond this count in the life of the
    /// thread escalate to `STOP` (spec.md §4.4, "Repeated moderator
    /// violations beyond a threshold escalate to STOP").
    #[serde(default = "default_max_contract_violations")]
    pub max_contract_violations: u32,
}

fn default_max_contract_violations() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub id: String,
    pub schema: ToolSchema,
    pub budget: ToolBudget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Agent(AgentSpec),
    Moderator(ModeratorSpec),
    Summarizer(SummarizerSpec),
    User(UserSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Role name looked up via `ProviderRegistry::for_role`.
    pub role: String,
    pub system_prompt: String,
    /// Subset of `Preset::tools` ids this agent may call.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_max_tool_iterations() -> usize {
    3
}

fn default_window() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeratorSpec {
    pub role: String,
    pub system_prompt: String,
    #[serde(default = "default_window")]
    pub window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerSpec {
    pub role: String,
    #[serde(default = "default_window")]
    pub window: usize,
    /// Forced extra fire after the last planned iteration of a `run`, even
    /// if the scheduler didn't pick this node (spec.md §4.2).
    #[serde(default)]
    pub run_on_last: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSpec {
    /// Keys the per-user-node FIFO queue in `ConversationState`.
    pub user_node_id: String,
}

impl Preset {
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn tool(&self, id: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.id == id)
    }

    /// Node id of the summarizer configured with `run_on_last = true`, if
    /// any (at most one is expected per preset).
    pub fn run_on_last_summarizer(&self) -> Option<&str> {
        self.nodes.iter().find_map(|n| match &n.kind {
            NodeKind::Summarizer(s) if s.run_on_last => Some(n.id.as_str()),
            _ => None,
        })
    }
}
