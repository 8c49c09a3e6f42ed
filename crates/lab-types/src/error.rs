/// Shared error type used across all lab crates.
///
/// Variant names follow the taxonomy in the design document: each one
/// corresponds to a caller-visible error kind, not an implementation detail.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("provider error ({kind}): {message}")]
    Provider { kind: ProviderErrorKind, message: String },

    #[error("tool error: {0}")]
    Tool(String),

    #[error("budget exceeded: tool {tool_id} would exceed {scope} limit ({used}/{max})")]
    BudgetExceeded {
        tool_id: String,
        scope: &'static str,
        used: u32,
        max: u32,
    },

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("conversation already exists: {0}")]
    ConversationAlreadyExists(String),

    #[error("conversation not active: {0}")]
    ConversationNotActive(String),

    #[error("capacity exceeded: {0}")]
    Capacity(String),

    #[error("queue full: {0}")]
    QueueFull(String),

    #[error("invalid preset: {0}")]
    InvalidPreset(String),

    #[error("streaming error: {0}")]
    Streaming(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("fatal store error: {0}")]
    FatalStore(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Transport,
    RateLimited,
    InvalidRequest,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::RateLimited => "rate_limited",
            Self::InvalidRequest => "invalid_request",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
