/// Core error type for the bot engine.
///
/// Adapter crates map their transport errors into this type so the polling
/// loop can tell retryable failures apart from fatal ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid setup: unknown event name, missing photo source, bad keyboard name.
    #[error("config error: {0}")]
    Config(String),

    /// Connection-level failure talking to the Bot API.
    #[error("transport error: {0}")]
    Transport(String),

    /// A user-supplied handler failed during dispatch.
    #[error("handler error: {0}")]
    Handler(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Whether the polling loop should simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
