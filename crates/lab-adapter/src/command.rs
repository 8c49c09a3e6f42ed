use tokio::sync::oneshot;

use lab_types::Result;

/// Requests routed to a conversation's owning task over its bounded command
/// queue (spec.md §4.6). Each carries a one-shot reply so the caller can
/// await the outcome without blocking the drive loop itself.
pub enum Command {
    PostUserMessage { content: String, user_id: String, reply: oneshot::Sender<Result<()>> },
    SetRounds { rounds: i64, reply: oneshot::Sender<Result<()>> },
    ChangeTopic { topic: String, reply: oneshot::Sender<Result<()>> },
}
