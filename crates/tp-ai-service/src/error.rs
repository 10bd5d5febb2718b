//! AI service error taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the gateway, interpreter and diagnoser.
///
/// A degraded parse is never an error; every variant here is a hard failure
/// the caller has to act on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot reach model backend: {0}")]
    Connection(String),

    #[error("credential rejected by model backend (HTTP {status})")]
    Auth { status: u16 },

    #[error("model backend did not respond within {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("model backend is rate limiting requests")]
    RateLimited { retry_after: Option<Duration> },

    #[error("model backend error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("request rejected by model backend (HTTP {status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("invalid response from model backend: {0}")]
    InvalidResponse(String),
}

/// Field-less discriminant of [`AiError`] for branching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Connection,
    Auth,
    Timeout,
    RateLimited,
    Upstream,
    BadRequest,
    InvalidResponse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Connection => "connection",
            Self::Auth => "auth",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Upstream => "upstream",
            Self::BadRequest => "bad_request",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }

    /// Only timeouts, throttling and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::RateLimited | ErrorKind::Upstream
        )
    }
}

/// Convenience alias for AI service results.
pub type AiResult<T> = Result<T, AiError>;
