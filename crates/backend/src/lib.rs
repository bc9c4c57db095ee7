//! Generation backends.
//!
//! A backend is whatever turns prompts into images. The driver only needs two
//! things from it, captured by [`GenerationBackend`]: a liveness check and
//! "submit this batch and tell me when it's done". Implementations:
//!
//! - [`QueueBackend`]: pushes tasks onto an in-process [`TaskQueue`] shared
//!   with the generation worker, then polls them to completion.
//! - [`HttpBackend`]: calls the generation application's web API.
//! - [`DryRunBackend`]: only lists the prompts.
//! - `MockBackend` (feature `mock`): scriptable backend for tests.

pub mod backend;
pub mod error;
mod params;
pub mod queue;

pub use crate::backend::{
    DryRunBackend, GenerationBackend, HttpBackend, HttpSettings, QueueBackend, QueueSettings, Receipt, TaskMode,
};
#[cfg(feature = "mock")]
pub use crate::backend::MockBackend;
pub use crate::params::GenerationParams;
pub use crate::queue::{GenerationTask, TaskQueue, TaskStatus};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn GenerationBackend + Send + Sync>;
