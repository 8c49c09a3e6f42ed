//! Multiplexes many running conversation Engines behind bounded event and
//! command queues, exposing the lifecycle operations spec.md §4.6 calls
//! the "External Adapter": `start_conversation`, `post_user_message`,
//! `stream_events`, `set_conversation_rounds`, `change_conversation_topic`,
//! `can_resume_conversation`, plus pause/resume/stop/cleanup.

mod actor;
mod adapter;
mod command;
mod validate;

pub use adapter::Adapter;
pub use validate::validate_preset;
