use lab_providers::{ChatRequest, ProviderRegistry};
use lab_tools::ToolRegistry;
use lab_types::event::Event;
use lab_types::message::{Message, ToolCall};
use lab_types::moderator::ModeratorRecord;
use lab_types::node_output::NodeOutput;
use lab_types::transcript::EntryRole;

use crate::preset::{AgentSpec, ModeratorSpec, NodeKind, NodeSpec, Preset, SummarizerSpec, UserSpec};
use crate::state::ConversationState;

/// What one node's `execute` pass produced, *after* internal failures have
/// already been folded into `events` (spec.md §4.4: "per-turn errors are
/// caught inside the Engine, converted to `error` events, and the loop
/// continues"). The Engine never sees a raw `Err` from here for an
/// ordinary turn failure — only truly fatal errors (store writes) are
/// allowed to propagate, and those happen one layer up.
pub enum NodeTurnResult {
    Produced(NodeOutput),
    Skipped,
    Abandoned,
}

pub struct NodeContext<'a> {
    pub providers: &'a ProviderRegistry,
    pub tools: &'a ToolRegistry,
    pub preset: &'a Preset,
}

pub async fn execute_node(
    spec: &NodeSpec,
    state: &mut ConversationState,
    ctx: &NodeContext<'_>,
    events: &mut Vec<Event>,
) -> NodeTurnResult {
    match &spec.kind {
        NodeKind::Agent(agent) => execute_agent(&spec.id, agent, state, ctx, events).await,
        NodeKind::Moderator(moderator) => execute_moderator(&spec.id, moderator, state, ctx, events).await,
        NodeKind::Summarizer(summarizer) => execute_summarizer(&spec.id, summarizer, state, ctx, events).await,
        NodeKind::User(user) => execute_user(&spec.id, user, state, events),
    }
}

fn provider_or_abandon(
    node_id: &str,
    role: &str,
    ctx: &NodeContext<'_>,
    events: &mut Vec<Event>,
) -> Option<std::sync::Arc<dyn lab_providers::LlmProvider>> {
    match ctx.providers.for_role(role) {
        Some(p) => Some(p),
        None => {
            events.push(Event::Error {
                kind: "provider".into(),
                message: format!("no provider assigned to role '{role}' (node {node_id})"),
                fatal: false,
            });
            None
        }
    }
}

async fn execute_agent(
    node_id: &str,
    agent: &AgentSpec,
    state: &mut ConversationState,
    ctx: &NodeContext<'_>,
    events: &mut Vec<Event>,
) -> NodeTurnResult {
    let Some(provider) = provider_or_abandon(node_id, &agent.role, ctx, events) else {
        return NodeTurnResult::Abandoned;
    };

    let mut messages = state.compose_messages(&agent.system_prompt, agent.window);
    let schemas: Vec<_> = agent.tools.iter().filter_map(|id| ctx.preset.tool(id)).map(|t| t.schema.clone()).collect();
    let mut tool_metadata: Option<serde_json::Value> = None;

    for _loop_idx in 0..agent.max_tool_iterations.max(1) {
        let req = ChatRequest { messages: messages.clone(), tools: schemas.clone(), model: None, json_mode: false, timeout: None };
        let response = match provider.chat(req).await {
            Ok(r) => r,
            Err(e) => {
                events.push(Event::Error { kind: "provider".into(), message: e.to_string(), fatal: false });
                return NodeTurnResult::Abandoned;
            }
        };

        let Some(call) = response.tool_calls.first().cloned() else {
            let mut output = NodeOutput::new(EntryRole::Agent, response.content);
            output.metadata = tool_metadata;
            return NodeTurnResult::Produced(output);
        };

        messages.push(Message::assistant(&response.content));

        if let Err(reason) = state.can_call_tool(&call.tool) {
            events.push(Event::ToolError { node_id: node_id.into(), tool_id: call.tool.clone(), message: reason.to_string() });
            messages.push(tool_failure_message(&call, &reason.to_string()));
            continue;
        }

        events.push(Event::ToolCall { node_id: node_id.into(), tool_id: call.tool.clone(), args: call.args.clone() });
        match ctx.tools.invoke(&call.tool, call.args.clone()).await {
            Ok(outcome) => {
                state.record_tool_call(&call.tool);
                events.push(Event::ToolResult { node_id: node_id.into(), tool_id: call.tool.clone(), ok: outcome.ok });
                if let Some(meta) = &outcome.metadata {
                    tool_metadata = Some(merge_metadata(tool_metadata.take(), meta.clone()));
                }
                messages.push(tool_outcome_message(&call, &outcome));
            }
            Err(e) => {
                events.push(Event::ToolError { node_id: node_id.into(), tool_id: call.tool.clone(), message: e.to_string() });
                messages.push(tool_failure_message(&call, &e.to_string()));
            }
        }
    }

    // Overflow: bounded loop exhausted without a final answer. Emit the
    // last provider content verbatim (spec.md §4.2).
    let last_content = messages
        .iter()
        .rev()
        .find(|m| m.role == lab_types::message::Role::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default();
    let mut output = NodeOutput::new(EntryRole::Agent, last_content);
    output.metadata = tool_metadata;
    NodeTurnResult::Produced(output)
}

fn merge_metadata(existing: Option<serde_json::Value>, incoming: serde_json::Value) -> serde_json::Value {
    match existing {
        Some(serde_json::Value::Object(mut m)) => {
            if let serde_json::Value::Object(om) = incoming {
                m.extend(om);
            }
            serde_json::Value::Object(m)
        }
        _ => incoming,
    }
}

fn tool_outcome_message(call: &ToolCall, outcome: &lab_tools::ToolOutcome) -> Message {
    let body = serde_json::json!({ "tool": call.tool, "ok": outcome.ok, "data": outcome.data, "error": outcome.error });
    Message::assistant(body.to_string())
}

fn tool_failure_message(call: &ToolCall, reason: &str) -> Message {
    let body = serde_json::json!({ "tool": call.tool, "ok": false, "error": reason });
    Message::assistant(body.to_string())
}

async fn execute_moderator(
    node_id: &str,
    moderator: &ModeratorSpec,
    state: &mut ConversationState,
    ctx: &NodeContext<'_>,
    events: &mut Vec<Event>,
) -> NodeTurnResult {
    let Some(provider) = provider_or_abandon(node_id, &moderator.role, ctx, events) else {
        return NodeTurnResult::Abandoned;
    };
    let messages = state.compose_messages(&moderator.system_prompt, moderator.window);
    let req = ChatRequest { messages, tools: vec![], model: None, json_mode: true, timeout: None };
    let response = match provider.chat(req).await {
        Ok(r) => r,
        Err(e) => {
            events.push(Event::Error { kind: "provider".into(), message: e.to_string(), fatal: false });
            return NodeTurnResult::Abandoned;
        }
    };
    match ModeratorRecord::parse(&response.content) {
        Ok(record) => {
            let metadata = serde_json::to_value(&record).ok();
            let mut output = NodeOutput::new(EntryRole::Moderator, record.summary.clone());
            output.metadata = metadata;
            output.moderator_action = Some(record);
            NodeTurnResult::Produced(output)
        }
        Err(e) => {
            events.push(Event::Error { kind: "contract_violation".into(), message: e.to_string(), fatal: false });
            state.contract_violations += 1;
            NodeTurnResult::Abandoned
        }
    }
}

async fn execute_summarizer(
    node_id: &str,
    summarizer: &SummarizerSpec,
    state: &mut ConversationState,
    ctx: &NodeContext<'_>,
    events: &mut Vec<Event>,
) -> NodeTurnResult {
    let Some(provider) = provider_or_abandon(node_id, &summarizer.role, ctx, events) else {
        return NodeTurnResult::Abandoned;
    };
    let messages = state.compose_messages("Summarize the conversation so far.", summarizer.window);
    let req = ChatRequest { messages, tools: vec![], model: None, json_mode: false, timeout: None };
    match provider.chat(req).await {
        Ok(response) => NodeTurnResult::Produced(NodeOutput::new(EntryRole::Summarizer, response.content)),
        Err(e) => {
            events.push(Event::Error { kind: "provider".into(), message: e.to_string(), fatal: false });
            NodeTurnResult::Abandoned
        }
    }
}

fn execute_user(node_id: &str, user: &UserSpec, state: &mut ConversationState, events: &mut Vec<Event>) -> NodeTurnResult {
    match state.pop_user_input(&user.user_node_id) {
        Some((content, _user_id)) => NodeTurnResult::Produced(NodeOutput::new(EntryRole::User, content)),
        None => {
            events.push(Event::NodeSkipped { node_id: node_id.into() });
            NodeTurnResult::Skipped
        }
    }
}

