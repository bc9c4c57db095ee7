//! Prompt files: discovery, parsing and batching.
//!
//! A prompt file is a UTF-8 text file in the prompts directory with one
//! prompt per line. [`PromptDirectory`] finds and reads them, [`parse`] turns
//! their contents into [`Prompt`]s, and [`batches`] splits those prompts into
//! order-preserving [`Batch`]es of at most [`BatchSize::MAX`].

mod batch;
mod directory;
pub mod error;
mod prompt;

pub use crate::batch::{Batch, BatchSize, batches};
pub use crate::directory::{DEFAULT_EXTENSION, PromptDirectory, PromptFile};
pub use crate::prompt::{COMMENT_MARKER, Prompt, parse};
