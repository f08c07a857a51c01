//! Error types for ytrag.

use thiserror::Error;

/// How an error affects the surrounding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; the operation may succeed if retried after a delay.
    Retryable,
    /// Permanent for one video only. The run records it and moves on.
    VideoScoped,
    /// No further progress is possible; the run stops.
    Fatal,
}

/// Library-level error type for ytrag operations.
#[derive(Error, Debug)]
pub enum YtragError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("Transient network error: {0}")]
    Transient(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Video unavailable: {0}")]
    VideoUnavailable(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: Box<YtragError> },

    #[error("Authentication required: {0}")]
    Auth(String),

    #[error("Source unavailable: {0}")]
    Source(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Volume storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl YtragError {
    /// Classify this error for retry and containment decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            YtragError::RateLimited(_) | YtragError::Transient(_) | YtragError::Timeout(_) => {
                ErrorClass::Retryable
            }
            YtragError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
                    ErrorClass::Retryable
                } else {
                    ErrorClass::VideoScoped
                }
            }
            YtragError::VideoUnavailable(_)
            | YtragError::Malformed(_)
            | YtragError::ExhaustedRetries { .. } => ErrorClass::VideoScoped,
            YtragError::Config(_)
            | YtragError::Auth(_)
            | YtragError::Source(_)
            | YtragError::InvalidInput(_)
            | YtragError::ToolNotFound(_)
            | YtragError::Ledger(_)
            | YtragError::Storage(_)
            | YtragError::Io(_)
            | YtragError::Json(_)
            | YtragError::TomlParse(_)
            | YtragError::Database(_) => ErrorClass::Fatal,
        }
    }

    /// Whether the operation that produced this error should be retried.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

/// Result type alias for ytrag operations.
pub type Result<T> = std::result::Result<T, YtragError>;
