use thiserror::Error;

/// Convenience type alias for Results with [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Top-level error type for the orchestrator.
///
/// Every loop tick is its own failure domain: these errors are logged and
/// handled locally by the caller, they never unwind past a tick boundary.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("board store error ({status:?}): {message}")]
    Store {
        status: Option<u16>,
        message: String,
    },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("could not extract structured output from model response")]
    Extract,

    #[error("agent error: {0}")]
    Agent(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
