//! Shared domain types for the conversation engine and task scheduler.
//!
//! Every lab crate depends on this one for the wire-level vocabulary
//! (messages, transcript entries, moderator records, events, errors) so
//! that the Engine, the Store, and the Adapter never have to translate
//! between incompatible representations of the same concept.

pub mod budget;
pub mod error;
pub mod event;
pub mod message;
pub mod moderator;
pub mod node_output;
pub mod thread;
pub mod transcript;

pub use error::{Error, Result};
