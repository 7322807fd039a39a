//! Error types used throughout the workspace

use std::time::Duration;

use thiserror::Error;

use crate::types::{Category, TaskHandle, TaskId, TaskStatus};

/// Failure raised by a transport before any HTTP status was obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failure: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl TransportError {
    /// Failures where the request may never have reached the server.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Body(_))
    }
}

/// Main error type for wbgate
#[derive(Error, Debug)]
pub enum WbError {
    /// Local admission denied before the deadline, or the server rejected the
    /// call with 429 despite local admission.
    #[error("rate limit exceeded for {category} (retry after {retry_after:?})")]
    RateLimitExceeded { category: Category, retry_after: Duration },

    #[error("task {task_id} timed out after {timeout:?} (last status {})", .last_known.status())]
    TaskTimeout { task_id: TaskId, timeout: Duration, last_known: Box<TaskHandle> },

    #[error("task {task_id} failed with status {status}{}", format_errors(.errors))]
    TaskFailed { task_id: TaskId, status: TaskStatus, errors: Vec<String> },

    /// The outcome could not be determined: status checks kept failing.
    #[error(
        "status of task {task_id} unknown after {consecutive_failures} consecutive failed checks: {last_error}"
    )]
    TaskIndeterminate { task_id: TaskId, consecutive_failures: u32, last_error: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("[400] validation error: {0}")]
    Validation(String),

    #[error("[401] authentication error: {0}")]
    Auth(String),

    #[error("[403] access forbidden: {0}")]
    Forbidden(String),

    #[error("[404] not found: {0}")]
    NotFound(String),

    #[error("[{status}] server error: {message}")]
    Server { status: u16, message: String },

    #[error("[{status}] unexpected response: {message}")]
    Http { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

fn format_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(": {}", errors.join("; "))
    }
}

impl WbError {
    /// Whether repeating the same call later can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded { .. }
                | Self::Transport(_)
                | Self::Server { .. }
                | Self::TaskIndeterminate { .. }
        )
    }

    /// Server- or limiter-suggested wait before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Stable label suitable for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded { .. } => "rate_limit",
            Self::TaskTimeout { .. } => "task_timeout",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskIndeterminate { .. } => "task_indeterminate",
            Self::Transport(_) => "transport",
            Self::Validation(_) => "validation",
            Self::Auth(_) => "auth",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Server { .. } => "server",
            Self::Http { .. } => "http",
            Self::Decode(_) => "decode",
            Self::Config(_) => "config",
        }
    }
}

/// Result type alias for wbgate operations
pub type Result<T> = std::result::Result<T, WbError>;
