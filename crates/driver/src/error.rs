//! Driver Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A driver error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Per-file errors (the run carries on with the next file)
/// - [`ErrorKind::Read`]
/// - [`ErrorKind::EmptyInput`]
/// - [`ErrorKind::Submission`]
/// - [`ErrorKind::Deletion`]
///
/// ### Run errors
/// - [`ErrorKind::BackendUnavailable`]
/// - [`ErrorKind::Scan`]
///
/// None of them are retried; the prompt file stays where it is so the
/// operator can fix the cause and run again.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The prompt file could not be read or is not valid UTF-8.
    #[display("could not read prompt file {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// The prompt file has no usable prompts.
    #[display("no valid prompts in {}", _0.display())]
    EmptyInput(#[error(not(source))] PathBuf),
    /// A batch was not accepted; later batches of the file were not submitted.
    #[display("batch {batch}/{total} of {file} failed")]
    Submission { file: String, batch: usize, total: usize },
    /// Every batch succeeded but the file could not be removed afterwards.
    #[display("could not delete processed file {}", _0.display())]
    Deletion(#[error(not(source))] PathBuf),
    /// The backend failed its liveness check; nothing was processed.
    #[display("generation backend `{_0}` is not available")]
    BackendUnavailable(#[error(not(source))] String),
    /// The prompts directory could not be listed.
    #[display("could not scan prompts directory {}", _0.display())]
    Scan(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Submission { .. } | Self::BackendUnavailable(_) | Self::Scan(_))
    }
}
