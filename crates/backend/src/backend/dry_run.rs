//! Backend that only lists prompts.

use crate::backend::{GenerationBackend, Receipt};
use crate::error::Result;
use async_trait::async_trait;
use promptdrop_prompts::Batch;

/// Dry-run backend.
///
/// Nothing is generated: every prompt is logged with its 1-based index within
/// its file, and every batch "succeeds".
#[derive(Clone, Debug)]
pub struct DryRunBackend {
    name: String,
}
impl DryRunBackend {
    pub fn new() -> Self {
        Self { name: "dry-run".to_string() }
    }
}
impl Default for DryRunBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for DryRunBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_liveness(&self) -> Result<()> {
        Ok(())
    }

    async fn submit_batch(&self, batch: &Batch<'_>) -> Result<Receipt> {
        for (index, prompt) in batch.numbered() {
            tracing::info!(batch = batch.number, "[{index:>3}] {prompt}");
        }
        Ok(Receipt {
            prompts: batch.len(),
            submissions: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptdrop_prompts::{BatchSize, batches, parse};

    #[tokio::test]
    async fn test_every_batch_succeeds_without_submitting() {
        let backend = DryRunBackend::new();
        assert_eq!(backend.name(), "dry-run");
        backend.check_liveness().await.unwrap();
        let prompts = parse("one\ntwo\nthree\n");
        let mut total = 0;
        for batch in batches(&prompts, BatchSize::new(2)) {
            let receipt = backend.submit_batch(&batch).await.unwrap();
            assert_eq!(receipt.submissions, 0);
            total += receipt.prompts;
        }
        assert_eq!(total, 3);
    }
}
