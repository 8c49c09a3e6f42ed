//! Provider-agnostic LLM chat interface and registry.
//!
//! Concrete adapters (OpenAI-compatible, Anthropic, etc.) live outside this
//! crate; it only defines the seam ([`LlmProvider`]) and the bookkeeping
//! around it ([`ProviderRegistry`]) that the engine calls through.

mod registry;
mod traits;

#[cfg(feature = "testing")]
mod fake;

pub use registry::{ProviderInitError, ProviderRegistry};
pub use traits::{ChatRequest, ChatResponse, LlmProvider};

#[cfg(feature = "testing")]
pub use fake::FakeProvider;
