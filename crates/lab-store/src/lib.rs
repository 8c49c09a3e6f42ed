//! Append-only transcript storage and checkpoint persistence.
//!
//! One [`Store`] owns a base directory on disk. Each thread gets its own
//! transcript file (JSONL, append-only) and an optional checkpoint file
//! holding the last durable snapshot of its engine state. Writes for a
//! given thread are serialized through a per-thread lock so concurrent
//! `step()` callers never interleave lines; different threads proceed
//! fully in parallel.

mod checkpoint;
mod fs_store;
mod index;

pub use checkpoint::Snapshot;
pub use fs_store::Store;
pub use index::ThreadSummary;
