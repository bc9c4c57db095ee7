//! Scriptable backend for testing.

use crate::backend::{GenerationBackend, Receipt};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use promptdrop_prompts::Batch;
use std::sync::Mutex;

type SubmitHook = Box<dyn Fn(usize) + Send + Sync>;

/// In-memory generation backend for testing.
///
/// Records every submitted batch (as plain strings) and can be told to fail
/// a particular submission or to report itself as unreachable. Ideal for
/// tests that need a [`GenerationBackend`] without a worker or a network.
///
/// # Examples
///
/// ```ignore
/// // Requires the `mock` feature.
/// use promptdrop_backend::{GenerationBackend, MockBackend};
/// use promptdrop_prompts::{BatchSize, batches, parse};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let backend = MockBackend::new().failing_on(2);
/// let prompts = parse("a\nb\nc\n");
/// let mut parts = batches(&prompts, BatchSize::new(1));
/// assert!(backend.submit_batch(&parts.next().unwrap()).await.is_ok());
/// assert!(backend.submit_batch(&parts.next().unwrap()).await.is_err());
/// assert_eq!(backend.submissions(), vec![vec!["a".to_string()], vec!["b".to_string()]]);
/// # }
/// ```
pub struct MockBackend {
    name: String,
    live: bool,
    fail_on: Option<usize>,
    hook: Option<SubmitHook>,
    // The panic on a poisoned lock is DELIBERATE. MockBackend is only used in
    // tests, where a panic elsewhere has already failed the test.
    submitted: Mutex<Vec<Vec<String>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            live: true,
            fail_on: None,
            hook: None,
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fail the liveness check.
    pub fn unavailable(mut self) -> Self {
        self.live = false;
        self
    }

    /// Fail the `n`th (1-based) submission. The failed batch is still recorded.
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on = Some(n);
        self
    }

    /// Run `hook` with the 1-based submission number whenever a batch is
    /// submitted, before the outcome is decided.
    pub fn on_submit(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Every batch submitted so far, in order.
    pub fn submissions(&self) -> Vec<Vec<String>> {
        self.submitted.lock().expect("mock backend lock poisoned").clone()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_liveness(&self) -> Result<()> {
        if !self.live {
            exn::bail!(ErrorKind::Unavailable("mock backend is down".to_string()));
        }
        Ok(())
    }

    async fn submit_batch(&self, batch: &Batch<'_>) -> Result<Receipt> {
        let number = {
            let mut submitted = self.submitted.lock().expect("mock backend lock poisoned");
            submitted.push(batch.prompts.iter().map(|p| p.as_str().to_string()).collect());
            submitted.len()
        };
        if let Some(hook) = &self.hook {
            hook(number);
        }
        if self.fail_on == Some(number) {
            exn::bail!(ErrorKind::TaskFailed(format!("mock submission {number} failed")));
        }
        Ok(Receipt {
            prompts: batch.len(),
            submissions: 1,
        })
    }
}
