//! Error types for the task bridge
//!
//! This module defines all error types used throughout the crate.
//! Task-scoped variants always carry the task ID.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the task bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Bad credentials, or re-authentication exhausted
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Refresh token expired or rejected
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// The API answered 401 for an in-flight request
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The server reported the task as failed (or the task does not exist)
    #[error("Task {task_id} failed: {message}")]
    TaskFailed {
        /// Task identifier
        task_id: String,
        /// Server-reported error detail
        message: String,
    },

    /// The task was still running when the deadline elapsed
    #[error("Task {task_id} did not finish within {timeout:?}")]
    TaskTimeout {
        /// Task identifier
        task_id: String,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// The task finished but its payload lacked the expected identifier
    #[error("Task {task_id} result extraction failed: {message}")]
    Extraction {
        /// Task identifier
        task_id: String,
        /// What was missing or malformed
        message: String,
    },

    /// Fetching the task status kept failing with transient errors
    #[error("Task {task_id} status fetch failed after {attempts} attempts: {message}")]
    TransientFetch {
        /// Task identifier
        task_id: String,
        /// Number of consecutive failed fetches
        attempts: usize,
        /// The last transient error
        message: String,
    },

    /// Invalid input (e.g. an empty token pair)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource or task not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Connection-level failures (request never got a status)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status from the API
    #[error("HTTP error {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// I/O errors (config file loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a refresh error
    pub fn refresh(msg: impl Into<String>) -> Self {
        Self::Refresh(msg.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a task-failed error
    pub fn task_failed(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskFailed {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    /// Create a task timeout error
    pub fn task_timeout(task_id: impl Into<String>, timeout: Duration) -> Self {
        Self::TaskTimeout {
            task_id: task_id.into(),
            timeout,
        }
    }

    /// Create a result extraction error
    pub fn extraction(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an HTTP status error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed
    ///
    /// Network failures, 5xx responses and rate limiting are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::RateLimited(_) => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// Whether this is the 401 signal that should trigger re-authentication
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// The task this error is about, if any
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskFailed { task_id, .. }
            | Self::TaskTimeout { task_id, .. }
            | Self::Extraction { task_id, .. }
            | Self::TransientFetch { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
