/// Errors surfaced by the client components.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected before any I/O.
    #[error("{0}")]
    Validation(String),

    /// The caller's token balance cannot pay for the request.
    #[error("{0}")]
    InsufficientCredits(String),

    /// The server answered with a non-2xx status.
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },

    /// The request never completed (connect, TLS, decode, ...).
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A 2xx response that did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The session went idle and its tokens were dropped.
    #[error("Session expired due to inactivity")]
    SessionExpired,

    /// A retried operation failed on every attempt.
    #[error("{0}")]
    RetriesExhausted(String),

    /// Status polling gave up (attempts or wall-clock budget).
    #[error("{0}")]
    Polling(String),
}

impl ClientError {
    pub fn is_insufficient_credits(&self) -> bool {
        matches!(self, Self::InsufficientCredits(_))
    }
}
