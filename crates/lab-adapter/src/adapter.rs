use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_stream::wrappers::ReceiverStream;

use lab_engine::{Engine, EngineHandle, NodeKind, Preset};
use lab_providers::ProviderRegistry;
use lab_store::Store;
use lab_tools::ToolRegistry;
use lab_types::event::ConversationEvent;
use lab_types::{Error, Result};

use crate::actor::drive;
use crate::command::Command;
use crate::validate::validate_preset;

const COMMAND_QUEUE_CAPACITY: usize = 32;
const EVENT_QUEUE_CAPACITY: usize = 256;

struct ConversationHandle {
    #[allow(dead_code)]
    preset_ref: String,
    engine_handle: EngineHandle,
    cmd_tx: mpsc::Sender<Command>,
    events_rx: AsyncMutex<Option<mpsc::Receiver<ConversationEvent>>>,
    task: tokio::task::JoinHandle<()>,
}

/// Multiplexes many running [`Engine`]s behind a bounded set of lifecycle
/// commands (spec.md §4.6). Each conversation's Engine is owned
/// exclusively by its own background task ([`crate::actor::drive`]); the
/// Adapter only ever reaches it through a command queue and an
/// [`EngineHandle`], never directly.
pub struct Adapter {
    conversations: Mutex<HashMap<String, Arc<ConversationHandle>>>,
    providers: Arc<ProviderRegistry>,
    tools: Arc<ToolRegistry>,
    store: Arc<Store>,
    max_concurrent: usize,
}

impl Adapter {
    pub fn new(providers: Arc<ProviderRegistry>, tools: Arc<ToolRegistry>, store: Arc<Store>, max_concurrent: usize) -> Self {
        Self { conversations: Mutex::new(HashMap::new()), providers, tools, store, max_concurrent }
    }

    pub fn can_resume_conversation(&self, id: &str) -> bool {
        Engine::can_resume(&self.store, id)
    }

    pub fn active_conversation_count(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }

    /// Starts, or resumes, a conversation (spec.md §4.6,
    /// `start_conversation`). `id` is generated when omitted; `topic`
    /// overrides the preset's declared objective. Returns the id used.
    pub async fn start_conversation(&self, preset_ref: impl Into<String>, mut preset: Preset, topic: impl Into<String>, id: Option<String>, resume: bool) -> Result<String> {
        validate_preset(&preset)?;

        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let preset_ref = preset_ref.into();
        preset.objective = topic.into();

        {
            let conversations = self.conversations.lock().unwrap();
            if conversations.contains_key(&id) {
                return Err(Error::ConversationAlreadyExists(id));
            }
            if conversations.len() >= self.max_concurrent {
                return Err(Error::Capacity(format!("max_concurrent_conversations ({}) reached", self.max_concurrent)));
            }
        }

        let user_node_id = preset.nodes.iter().find_map(|n| match &n.kind {
            NodeKind::User(u) => Some(u.user_node_id.clone()),
            _ => None,
        });

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (engine, engine_handle) = if resume {
            Engine::resume(id.clone(), preset_ref.clone(), preset, self.providers.clone(), self.tools.clone(), self.store.clone(), events_tx)?
        } else {
            Engine::new(id.clone(), preset_ref.clone(), preset, self.providers.clone(), self.tools.clone(), self.store.clone(), events_tx)
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let task = tokio::spawn(drive(engine, engine_handle.clone(), cmd_rx, user_node_id, i64::MAX));
        let handle = Arc::new(ConversationHandle { preset_ref, engine_handle, cmd_tx, events_rx: AsyncMutex::new(Some(events_rx)), task });

        let mut conversations = self.conversations.lock().unwrap();
        if conversations.contains_key(&id) {
            handle.task.abort();
            return Err(Error::ConversationAlreadyExists(id));
        }
        conversations.insert(id.clone(), handle);
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Arc<ConversationHandle>> {
        self.conversations.lock().unwrap().get(id).cloned().ok_or_else(|| Error::ConversationNotFound(id.to_string()))
    }

    fn ensure_active(id: &str, handle: &ConversationHandle) -> Result<()> {
        if handle.engine_handle.is_stopped() {
            return Err(Error::ConversationNotActive(id.to_string()));
        }
        Ok(())
    }

    async fn send_command(&self, id: &str, build: impl FnOnce(oneshot::Sender<Result<()>>) -> Command) -> Result<()> {
        let handle = self.get(id)?;
        Self::ensure_active(id, &handle)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        match handle.cmd_tx.try_send(build(reply_tx)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => return Err(Error::QueueFull(format!("conversation '{}' command queue is full", id))),
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(Error::ConversationNotActive(id.to_string())),
        }

        reply_rx.await.map_err(|_| Error::ConversationNotActive(id.to_string()))?
    }

    /// spec.md §4.6, `post_user_message`.
    pub async fn post_user_message(&self, id: &str, content: impl Into<String>, user_id: impl Into<String>) -> Result<()> {
        let content = content.into();
        let user_id = user_id.into();
        self.send_command(id, move |reply| Command::PostUserMessage { content, user_id, reply }).await
    }

    /// spec.md §4.6, `set_conversation_rounds`.
    pub async fn set_conversation_rounds(&self, id: &str, rounds: i64) -> Result<()> {
        self.send_command(id, move |reply| Command::SetRounds { rounds, reply }).await
    }

    /// spec.md §4.6, `change_conversation_topic`.
    pub async fn change_conversation_topic(&self, id: &str, topic: impl Into<String>) -> Result<()> {
        let topic = topic.into();
        self.send_command(id, move |reply| Command::ChangeTopic { topic, reply }).await
    }

    /// Hands out the conversation's event queue as a `Stream`, consuming it
    /// once (spec.md §4.6, `stream_events`) — a second call before the
    /// first stream is dropped reports `Error::Streaming`.
    pub async fn stream_events(&self, id: &str) -> Result<ReceiverStream<ConversationEvent>> {
        let handle = self.get(id)?;
        let mut guard = handle.events_rx.lock().await;
        guard.take().map(ReceiverStream::new).ok_or_else(|| Error::Streaming(format!("conversation '{}' already has an active event stream", id)))
    }

    pub fn pause_conversation(&self, id: &str) -> Result<()> {
        self.get(id)?.engine_handle.pause();
        Ok(())
    }

    pub fn resume_conversation(&self, id: &str) -> Result<()> {
        self.get(id)?.engine_handle.resume();
        Ok(())
    }

    pub fn stop_conversation(&self, id: &str) -> Result<()> {
        self.get(id)?.engine_handle.stop();
        Ok(())
    }

    /// Drops the conversation's bookkeeping once its drive task has exited.
    /// Aborts a still-running task rather than leaving it orphaned.
    pub fn cleanup_conversation(&self, id: &str) -> Result<()> {
        let handle = self.conversations.lock().unwrap().remove(id).ok_or_else(|| Error::ConversationNotFound(id.to_string()))?;
        handle.task.abort();
        Ok(())
    }
}
