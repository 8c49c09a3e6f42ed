use tokio::sync::mpsc;

use lab_engine::{Engine, EngineHandle};
use lab_types::Error;

use crate::command::Command;

/// Drives one [`Engine`] to completion on its own task, interleaving
/// `step()` calls with whatever arrives on `cmd_rx` (spec.md §4.6: the
/// Adapter never touches an `Engine` directly once it is handed off here).
///
/// While paused, or once the round budget is exhausted, the loop stops
/// stepping and blocks on the command queue alone — a conversation sitting
/// idle costs nothing but a parked task.
pub async fn drive(mut engine: Engine, handle: EngineHandle, mut cmd_rx: mpsc::Receiver<Command>, user_node_id: Option<String>, initial_rounds: i64) {
    let mut rounds_remaining = initial_rounds;

    loop {
        if handle.is_stopped() {
            break;
        }

        if handle.is_paused() || rounds_remaining <= 0 {
            match cmd_rx.recv().await {
                Some(cmd) => apply(&mut engine, cmd, user_node_id.as_deref(), &mut rounds_remaining).await,
                None => break,
            }
            continue;
        }

        tokio::select! {
            biased;
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => apply(&mut engine, cmd, user_node_id.as_deref(), &mut rounds_remaining).await,
                None => break,
            },
            result = engine.step() => {
                match result {
                    Ok(_) => {
                        rounds_remaining -= 1;
                        if engine.stop_requested() {
                            break;
                        }
                    }
                    Err(err) => {
                        // The Engine already moved itself to `Errored` and
                        // emitted a fatal `error` event before returning
                        // this — that event already reached anyone
                        // draining `stream_events`. This is just the
                        // local log for the task that owned the loop.
                        tracing::error!(error = %err, "conversation step failed fatally, stopping");
                        break;
                    }
                }
            }
        }
    }

    // Mark the handle stopped on every exit path, including an internal
    // moderator STOP or a fatal step error, so a subsequent lifecycle call
    // against this conversation observes "not active" immediately rather
    // than discovering it only when the command channel turns out closed.
    handle.stop();
}

async fn apply(engine: &mut Engine, cmd: Command, user_node_id: Option<&str>, rounds_remaining: &mut i64) {
    match cmd {
        Command::PostUserMessage { content, user_id, reply } => {
            let result = match user_node_id {
                Some(node_id) => engine.post_user_message(content, user_id, node_id, true, false).await,
                None => Err(Error::InvalidArgument("preset has no user node".into())),
            };
            let _ = reply.send(result);
        }
        Command::SetRounds { rounds, reply } => {
            *rounds_remaining = rounds;
            let _ = reply.send(Ok(()));
        }
        Command::ChangeTopic { topic, reply } => {
            engine.set_objective(topic);
            let _ = reply.send(Ok(()));
        }
    }
}
