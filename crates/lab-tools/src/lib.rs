//! Tool trait and registry for the Agent node's tool-call loop.
//!
//! Mirrors the shape of [`lab_providers`]: a thin trait at the seam, a
//! registry that looks tools up by name, and a scripted fake for tests.
//! Concrete tools (shell exec, HTTP fetch, ...) live outside this crate.

mod registry;
mod traits;

#[cfg(feature = "testing")]
mod fake;

pub use registry::ToolRegistry;
pub use traits::{Tool, ToolInvocation, ToolOutcome};

#[cfg(feature = "testing")]
pub use fake::FakeTool;
