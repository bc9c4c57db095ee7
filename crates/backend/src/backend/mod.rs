//! Generation backend trait and implementations.
//!
//! This module defines the `GenerationBackend` trait, the capability the
//! driver needs from whatever actually generates images: "are you there?" and
//! "here is a batch of prompts". Which implementation is used is a matter of
//! configuration.

mod dry_run;
mod http;
#[cfg(feature = "mock")]
mod mock;
mod queue;

pub use self::dry_run::DryRunBackend;
pub use self::http::{HttpBackend, HttpSettings};
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::queue::{QueueBackend, QueueSettings, TaskMode};
use crate::error::Result;
use async_trait::async_trait;
use promptdrop_prompts::Batch;

/// Outcome of a successful batch submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Receipt {
    /// Number of prompts from the batch that were submitted.
    pub prompts: usize,
    /// Number of backend units of work (tasks, requests) the batch became.
    pub submissions: usize,
}

/// Unified interface for generation backends.
///
/// # Examples
///
/// ```
/// use promptdrop_backend::{DryRunBackend, GenerationBackend};
/// use promptdrop_prompts::{BatchSize, batches, parse};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = DryRunBackend::new();
/// backend.check_liveness().await?;
/// let prompts = parse("a red fox\n# not this one\na blue whale\n");
/// for batch in batches(&prompts, BatchSize::default()) {
///     let receipt = backend.submit_batch(&batch).await?;
///     assert_eq!(receipt.prompts, 2);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// Check that the backend can accept work.
    ///
    /// Returns [`Unavailable`](crate::error::ErrorKind::Unavailable) if it
    /// can't. Backends without a separate process to reach are always live.
    async fn check_liveness(&self) -> Result<()>;

    /// Submit one batch and wait until the backend acknowledges completion.
    ///
    /// Batches are submitted strictly one at a time; implementations may
    /// assume no other submission is in flight.
    async fn submit_batch(&self, batch: &Batch<'_>) -> Result<Receipt>;
}
