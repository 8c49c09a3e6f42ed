use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use lab_providers::ProviderRegistry;
use lab_store::Store;
use lab_tools::ToolRegistry;
use lab_types::event::{new_run_id, ConversationEvent, Event};
use lab_types::moderator::ModeratorAction;
use lab_types::transcript::{EntryRole, TranscriptEntry};
use lab_types::{Error, Result};

use crate::node::{execute_node, NodeContext, NodeTurnResult};
use crate::preset::{NodeKind, Preset};
use crate::scheduler::scheduled_nodes;
use crate::state::ConversationState;

const DEFAULT_HISTORY_WINDOW: usize = 200;

/// Per-thread lifecycle (spec.md §4.4, "State machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Idle,
    Running,
    Paused,
    Stopping,
    Stopped,
    Errored,
}

/// External control surface for a running [`Engine`]. The Adapter holds
/// this (and a clone of the thread's event sender) while the Engine itself
/// runs on its single owning task — this is how pause/stop are observed
/// at the loop's suspension points without reaching into `State` directly.
#[derive(Clone)]
pub struct EngineHandle {
    pause: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl EngineHandle {
    pub fn pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }
    pub fn resume(&self) {
        self.pause.store(false, Ordering::SeqCst);
    }
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Composes State, the Node protocol, and the Scheduler into the runnable
/// per-thread loop (spec.md §4.4, "Conversation Engine"). One `Engine`
/// owns exactly one thread for its active lifetime — the Adapter is the
/// only thing that multiplexes several of these.
pub struct Engine {
    thread_id: String,
    preset_ref: String,
    preset: Preset,
    providers: Arc<ProviderRegistry>,
    tools: Arc<ToolRegistry>,
    store: Arc<Store>,
    state: ConversationState,
    status: ThreadStatus,
    events_tx: mpsc::Sender<ConversationEvent>,
    pause: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl Engine {
    /// Starts a fresh thread. `events_tx` is owned by the caller (normally
    /// the Adapter, which keeps the paired receiver as the thread's event
    /// queue) — this mirrors spec.md §3's "Adapter owns the mapping
    /// thread_id -> (Engine, event queue, user queue)".
    pub fn new(
        thread_id: impl Into<String>,
        preset_ref: impl Into<String>,
        preset: Preset,
        providers: Arc<ProviderRegistry>,
        tools: Arc<ToolRegistry>,
        store: Arc<Store>,
        events_tx: mpsc::Sender<ConversationEvent>,
    ) -> (Self, EngineHandle) {
        let state = ConversationState::new(&preset, DEFAULT_HISTORY_WINDOW);
        let pause = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = EngineHandle { pause: pause.clone(), stop: stop.clone() };
        let engine = Self {
            thread_id: thread_id.into(),
            preset_ref: preset_ref.into(),
            preset,
            providers,
            tools,
            store,
            state,
            status: ThreadStatus::Idle,
            events_tx,
            pause,
            stop,
        };
        (engine, handle)
    }

    /// Resumes a thread from its last checkpoint. Refuses (via the
    /// underlying `Store::load_checkpoint`) an opaque snapshot.
    pub fn resume(
        thread_id: impl Into<String>,
        preset_ref: impl Into<String>,
        preset: Preset,
        providers: Arc<ProviderRegistry>,
        tools: Arc<ToolRegistry>,
        store: Arc<Store>,
        events_tx: mpsc::Sender<ConversationEvent>,
    ) -> Result<(Self, EngineHandle)> {
        let thread_id = thread_id.into();
        let snapshot = store.load_checkpoint(&thread_id)?;
        let state = match snapshot {
            Some(s) => {
                let snap = serde_json::from_value(s.0)?;
                ConversationState::from_snapshot(&preset, DEFAULT_HISTORY_WINDOW, snap)
            }
            None => ConversationState::new(&preset, DEFAULT_HISTORY_WINDOW),
        };
        let pause = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = EngineHandle { pause: pause.clone(), stop: stop.clone() };
        let engine = Self {
            thread_id,
            preset_ref: preset_ref.into(),
            preset,
            providers,
            tools,
            store,
            state,
            status: ThreadStatus::Idle,
            events_tx,
            pause,
            stop,
        };
        Ok((engine, handle))
    }

    /// True iff a non-opaque checkpoint exists for `thread_id` (spec.md
    /// §4.6, `can_resume_conversation`).
    pub fn can_resume(store: &Store, thread_id: &str) -> bool {
        matches!(store.load_checkpoint(thread_id), Ok(Some(_)))
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn iter(&self) -> u64 {
        self.state.iter
    }

    /// Current objective/topic (spec.md §4.6, `change_conversation_topic`).
    pub fn objective(&self) -> &str {
        &self.state.objective
    }

    pub fn set_objective(&mut self, topic: impl Into<String>) {
        self.state.objective = topic.into();
    }

    /// True once a moderator STOP (or the contract-violation escalation)
    /// has fired for this thread. `run()` checks this between rounds; an
    /// external driver stepping the engine directly should too.
    pub fn stop_requested(&self) -> bool {
        self.state.stop_flag
    }

    /// `(per_iteration_calls, per_run_calls)` for `tool_id`, read off the
    /// live State (spec.md §8, budget-guard property).
    pub fn tool_usage(&self, tool_id: &str) -> (u32, u32) {
        let usage = self.state.get_tool_usage_stats();
        (usage.per_iteration_calls(tool_id), usage.per_run_calls(tool_id))
    }

    async fn emit(&self, event: Event, agent_id: Option<&str>) {
        let mut ce = ConversationEvent::new(self.thread_id.clone(), self.state.iter, event);
        if let Some(id) = agent_id {
            ce = ce.with_agent(id);
        }
        if self.events_tx.send(ce).await.is_err() {
            tracing::debug!(thread_id = %self.thread_id, "event receiver dropped, discarding event");
        }
    }

    async fn checkpoint(&mut self) -> Result<()> {
        let snapshot = self.state.to_snapshot();
        let value = serde_json::to_value(&snapshot)?;
        if let Err(err) = self.store.save_checkpoint(&self.thread_id, &lab_store::Snapshot(value)) {
            return Err(self.fatal(err).await);
        }
        Ok(())
    }

    /// A store write failing is unrecoverable for this thread (spec.md §4.4,
    /// "Fatal (store write failure, state corruption)"): stop the thread,
    /// emit the fatal event so an active `stream_events` consumer sees it,
    /// and hand back `FatalStore` for the `run`/`step` caller to re-raise.
    async fn fatal(&mut self, err: Error) -> Error {
        self.status = ThreadStatus::Errored;
        self.state.stop_flag = true;
        let message = err.to_string();
        self.emit(Event::Error { kind: "fatal_store".into(), message: message.clone(), fatal: true }, None).await;
        Error::FatalStore(message)
    }

    #[tracing::instrument(skip(self), fields(thread_id = %self.thread_id, node_id = %node_id))]
    async fn fire_node(&mut self, node_id: &str) -> Result<()> {
        let Some(idx) = self.preset.nodes.iter().position(|n| n.id == node_id) else {
            return Ok(());
        };

        let mut events: Vec<Event> = Vec::new();
        let result = {
            let ctx = NodeContext { providers: &self.providers, tools: &self.tools, preset: &self.preset };
            let spec = &self.preset.nodes[idx];
            execute_node(spec, &mut self.state, &ctx, &mut events).await
        };

        for e in events {
            self.emit(e, Some(node_id)).await;
        }

        match result {
            NodeTurnResult::Produced(output) => {
                self.emit(
                    Event::ProviderResult { node_id: node_id.to_string(), role: entry_role_str(output.role).to_string(), content_len: output.content.len() },
                    Some(node_id),
                )
                .await;

                let is_summarizer = matches!(self.preset.nodes[idx].kind, NodeKind::Summarizer(_));

                // A moderator's own action is applied against the history as it
                // stood *before* this turn's entry — so ROLLBACK trims the
                // entries that drew the moderator's concern, not its own
                // just-produced commentary.
                if let Some(record) = output.moderator_action.clone() {
                    self.apply_moderator_action(record.into_action()).await?;
                }

                let mut entry = TranscriptEntry::new(self.state.iter, node_id, output.role, output.content.clone());
                if let Some(meta) = output.metadata.clone() {
                    entry = entry.with_metadata(meta);
                }
                self.state.append_message(entry.clone());
                if let Err(err) = self.store.append_transcript(&self.thread_id, &self.preset_ref, &entry) {
                    return Err(self.fatal(err).await);
                }

                if is_summarizer {
                    self.state.running_summary = Some(output.content.clone());
                }
            }
            NodeTurnResult::Skipped => {}
            NodeTurnResult::Abandoned => {
                if self.state.contract_violations >= self.preset.max_contract_violations {
                    self.state.stop_flag = true;
                }
            }
        }
        Ok(())
    }

    async fn apply_moderator_action(&mut self, action: ModeratorAction) -> Result<()> {
        match action {
            ModeratorAction::Continue => {}
            ModeratorAction::Stop => {
                self.state.stop_flag = true;
                self.emit(Event::ModeratorAction { action: "STOP".into(), rollback: 0 }, None).await;
            }
            ModeratorAction::ClearSummaries => {
                self.state.running_summary = None;
                self.emit(Event::ModeratorAction { action: "CLEAR_SUMMARIES".into(), rollback: 0 }, None).await;
            }
            ModeratorAction::Rollback { n, clear_summaries } => {
                self.state.rollback(n, clear_summaries);
                let marker = TranscriptEntry::rollback_marker(self.state.iter, n as usize, clear_summaries);
                if let Err(err) = self.store.append_transcript(&self.thread_id, &self.preset_ref, &marker) {
                    return Err(self.fatal(err).await);
                }
                self.emit(Event::ModeratorAction { action: "ROLLBACK".into(), rollback: n }, None).await;
            }
        }
        Ok(())
    }

    /// Executes exactly one iteration (spec.md §4.4, `step`). Returns the
    /// new `iter` value.
    #[tracing::instrument(skip(self), fields(thread_id = %self.thread_id))]
    pub async fn step(&mut self) -> Result<u64> {
        self.status = ThreadStatus::Running;
        self.state.iter += 1;
        self.state.reset_iteration_counters();

        let node_ids: Vec<String> = scheduled_nodes(self.state.iter, &self.preset).into_iter().map(String::from).collect();

        for node_id in node_ids {
            if self.stop.load(Ordering::SeqCst) {
                self.status = ThreadStatus::Stopping;
                break;
            }
            if self.pause.load(Ordering::SeqCst) {
                self.status = ThreadStatus::Paused;
                break;
            }
            self.fire_node(&node_id).await?;
        }

        self.emit(Event::IterationComplete { iter: self.state.iter }, None).await;
        self.checkpoint().await?;
        Ok(self.state.iter)
    }

    /// Runs up to `rounds` iterations, or until `state.stop_flag` /
    /// external stop (spec.md §4.4, `run`).
    pub async fn run(&mut self, rounds: i64) -> Result<u64> {
        if rounds <= 0 {
            return Err(Error::InvalidArgument("rounds must be positive".into()));
        }
        self.status = ThreadStatus::Running;
        let mut last_iter = self.state.iter;

        for round in 0..rounds {
            if self.state.stop_flag || self.stop.load(Ordering::SeqCst) {
                break;
            }
            last_iter = self.step().await?;
            if matches!(self.status, ThreadStatus::Paused | ThreadStatus::Stopping) {
                break;
            }

            let is_last_round = round == rounds - 1;
            if is_last_round {
                if let Some(summarizer_id) = self.preset.run_on_last_summarizer().map(String::from) {
                    let already_fired = scheduled_nodes(last_iter, &self.preset).contains(&summarizer_id.as_str());
                    if !already_fired {
                        self.fire_node(&summarizer_id).await?;
                    }
                }
            }
        }

        self.status = match self.status {
            ThreadStatus::Paused => ThreadStatus::Paused,
            _ if self.stop.load(Ordering::SeqCst) => ThreadStatus::Stopped,
            _ => ThreadStatus::Stopped,
        };
        self.emit(Event::RunComplete, None).await;
        Ok(last_iter)
    }

    /// Spawns [`Self::run`] on its own task so the caller can read events
    /// from its paired receiver as they arrive, matching spec.md §4.4's
    /// `stream(rounds)`. Consumes the engine: once spawned, the only
    /// remaining interaction with this thread is through the
    /// [`EngineHandle`] and the event receiver.
    pub fn spawn_run(mut self, rounds: i64) -> tokio::task::JoinHandle<Result<u64>> {
        tokio::spawn(async move { self.run(rounds).await })
    }

    /// Enqueues a user message; optionally emits it synchronously and/or
    /// persists it immediately (spec.md §4.4, `post_user_message`).
    ///
    /// When `persist` is set, the message is written straight to the
    /// transcript and is *not* also placed on the user-node queue — so it
    /// is never separately dequeued by a later user-node turn.
    pub async fn post_user_message(
        &mut self,
        content: impl Into<String>,
        user_id: impl Into<String>,
        user_node_id: &str,
        immediate: bool,
        persist: bool,
    ) -> Result<()> {
        let content = content.into();
        let user_id = user_id.into();

        if persist {
            let entry = TranscriptEntry::new(self.state.iter, user_node_id, EntryRole::User, content.clone());
            self.state.append_message(entry.clone());
            if let Err(err) = self.store.append_transcript(&self.thread_id, &self.preset_ref, &entry) {
                return Err(self.fatal(err).await);
            }
        } else {
            self.state.push_user_input(user_node_id, content.clone(), user_id);
        }

        if immediate {
            self.emit(Event::UserMessage { content }, Some(user_node_id)).await;
        }
        Ok(())
    }

    /// Live in-memory window (spec.md §4.4, `history`).
    pub fn history(&self, limit: Option<usize>) -> Vec<TranscriptEntry> {
        self.state.history_window(limit)
    }

    /// Durable transcript read through the Store (spec.md §4.4, `transcript`).
    pub fn transcript(&self, limit: Option<usize>) -> Result<Vec<TranscriptEntry>> {
        self.store.read_transcript(&self.thread_id, 0, limit)
    }

    pub fn run_id_for_log() -> uuid::Uuid {
        new_run_id()
    }
}

fn entry_role_str(role: EntryRole) -> &'static str {
    match role {
        EntryRole::Agent => "agent",
        EntryRole::Moderator => "moderator",
        EntryRole::Summarizer => "summarizer",
        EntryRole::User => "user",
        EntryRole::System => "system",
    }
}
