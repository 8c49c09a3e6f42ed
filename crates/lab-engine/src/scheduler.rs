use crate::preset::Preset;

/// Pure function of `(iteration, turn_plan) -> ordered node ids` (spec.md
/// §4.3). The reference "every-N" rule: node `n` fires on iteration `i`
/// iff `i % cadence(n) == 0`. A node with no entry in `turn_plan` defaults
/// to cadence 1 (fires every iteration). Order follows the preset's
/// declared node order, which is also the tie-break.
pub fn scheduled_nodes(iter: u64, preset: &Preset) -> Vec<&str> {
    preset
        .nodes
        .iter()
        .filter(|n| {
            let cadence = preset.turn_plan.get(&n.id).copied().unwrap_or(1).max(1);
            iter % cadence == 0
        })
        .map(|n| n.id.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{AgentSpec, NodeKind, NodeSpec};
    use std::collections::HashMap;

    fn agent_node(id: &str) -> NodeSpec {
        NodeSpec {
            id: id.into(),
            kind: NodeKind::Agent(AgentSpec {
                role: "r".into(),
                system_prompt: "p".into(),
                tools: vec![],
                max_tool_iterations: 3,
                window: 10,
            }),
        }
    }

    fn preset_with_cadence(cadences: &[(&str, u64)]) -> Preset {
        Preset {
            objective: "o".into(),
            nodes: cadences.iter().map(|(id, _)| agent_node(id)).collect(),
            turn_plan: cadences.iter().map(|(id, c)| (id.to_string(), *c)).collect(),
            tools: vec![],
            max_contract_violations: 3,
        }
    }

    #[test]
    fn every_iteration_node_fires_every_time() {
        let preset = preset_with_cadence(&[("a", 1)]);
        assert_eq!(scheduled_nodes(1, &preset), vec!["a"]);
        assert_eq!(scheduled_nodes(2, &preset), vec!["a"]);
    }

    #[test]
    fn cadence_two_fires_on_even_iterations_only() {
        let preset = preset_with_cadence(&[("mod", 2)]);
        assert!(scheduled_nodes(1, &preset).is_empty());
        assert_eq!(scheduled_nodes(2, &preset), vec!["mod"]);
    }

    #[test]
    fn missing_cadence_defaults_to_every_iteration() {
        let preset = Preset {
            objective: "o".into(),
            nodes: vec![agent_node("a")],
            turn_plan: HashMap::new(),
            tools: vec![],
            max_contract_violations: 3,
        };
        assert_eq!(scheduled_nodes(3, &preset), vec!["a"]);
    }

    #[test]
    fn declared_order_breaks_ties() {
        let preset = preset_with_cadence(&[("talker", 1), ("user:alice", 1)]);
        assert_eq!(scheduled_nodes(1, &preset), vec!["talker", "user:alice"]);
    }
}
