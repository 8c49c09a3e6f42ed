use std::collections::HashSet;

use lab_engine::{NodeKind, Preset};
use lab_types::{Error, Result};

/// Structural checks a Preset must pass before an Engine is built from it
/// (spec.md §4.6, `InvalidPresetError`). The Engine itself trusts its
/// `Preset` completely, so these are the only checks a bad document gets.
pub fn validate_preset(preset: &Preset) -> Result<()> {
    if preset.nodes.is_empty() {
        return Err(Error::InvalidPreset("preset has no nodes".into()));
    }

    let mut seen = HashSet::new();
    for node in &preset.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(Error::InvalidPreset(format!("duplicate node id '{}'", node.id)));
        }
    }

    let tool_ids: HashSet<&str> = preset.tools.iter().map(|t| t.id.as_str()).collect();
    for node in &preset.nodes {
        if let NodeKind::Agent(agent) = &node.kind {
            for tool_id in &agent.tools {
                if !tool_ids.contains(tool_id.as_str()) {
                    return Err(Error::InvalidPreset(format!("node '{}' references unknown tool '{}'", node.id, tool_id)));
                }
            }
        }
    }

    for node_id in preset.turn_plan.keys() {
        if !seen.contains(node_id.as_str()) {
            return Err(Error::InvalidPreset(format!("turn_plan references unknown node '{}'", node_id)));
        }
    }

    Ok(())
}
