//! Backend Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A backend error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Liveness check failed; nothing should be submitted.
    #[display("backend unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// The request never got a response (connection refused, reset, timed out).
    #[display("request to {_0} failed")]
    Request(#[error(not(source))] String),
    /// The backend answered, but not with success.
    #[display("{url} responded with HTTP {status}")]
    Rejected { url: String, status: u16 },
    /// The generation worker reported the task as failed.
    #[display("generation task failed: {_0}")]
    TaskFailed(#[error(not(source))] String),
    /// The task did not complete within the configured deadline.
    #[display("generation task did not complete within {_0} seconds")]
    Timeout(#[error(not(source))] u64),
    /// Backend settings are unusable (bad URL, client construction failure).
    #[display("invalid backend configuration: {_0}")]
    Configuration(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Request(_) | Self::Timeout(_))
    }
}
