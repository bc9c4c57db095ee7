use crate::error::{ErrorKind, Result};
use crate::report::{FileReport, RunSummary};
use exn::ResultExt;
use promptdrop_backend::BackendHandle;
use promptdrop_prompts::{BatchSize, Prompt, PromptDirectory, PromptFile, batches};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(10);

/// How a [`BatchDriver`] behaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverOptions {
    pub batch_size: BatchSize,
    /// Remove a prompt file once every batch from it has succeeded.
    pub delete_after_success: bool,
    /// Keep rescanning instead of stopping after one pass.
    pub continuous: bool,
    /// Wait between scans in continuous mode.
    pub rescan_interval: Duration,
}
impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            batch_size: BatchSize::default(),
            delete_after_success: true,
            continuous: false,
            rescan_interval: DEFAULT_RESCAN_INTERVAL,
        }
    }
}

/// Feeds prompt files from a directory to a generation backend.
///
/// Everything happens sequentially: one file at a time, one batch at a time.
/// Cancelling the shutdown token stops the run after the file currently being
/// processed, or immediately while waiting to rescan.
pub struct BatchDriver {
    directory: PromptDirectory,
    backend: BackendHandle,
    options: DriverOptions,
    shutdown: CancellationToken,
}

impl BatchDriver {
    pub fn new(directory: PromptDirectory, backend: BackendHandle, options: DriverOptions) -> Self {
        Self {
            directory,
            backend,
            options,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use an existing token (e.g. one wired to a signal handler) for shutdown.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Token that stops the run when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// List the prompt files waiting to be processed, in processing order.
    pub async fn scan(&self) -> Result<Vec<PromptFile>> {
        self.directory.scan().await.or_raise(|| ErrorKind::Scan(self.directory.root().to_path_buf()))
    }

    /// Read the prompts of a single file. An empty list is not an error here.
    pub async fn parse(&self, file: &PromptFile) -> Result<Vec<Prompt>> {
        self.directory.read(file).await.or_raise(|| ErrorKind::Read(file.path.clone()))
    }

    /// Submit every prompt of `file`, batch by batch, then delete the file if
    /// configured to.
    ///
    /// Stops at the first failed batch. The file is only deleted when every
    /// batch succeeded; a failed deletion fails the file without anything
    /// being submitted again.
    #[instrument(skip_all, fields(file = %file.name))]
    pub async fn process_file(&self, file: &PromptFile) -> Result<FileReport> {
        let prompts = self.parse(file).await?;
        if prompts.is_empty() {
            exn::bail!(ErrorKind::EmptyInput(file.path.clone()));
        }
        let parts = batches(&prompts, self.options.batch_size);
        let total = parts.len();
        tracing::info!(prompts = prompts.len(), batches = total, backend = self.backend.name(), "Processing prompt file");
        let mut submissions = 0;
        for batch in parts {
            tracing::info!(batch = batch.number, total, size = batch.len(), "Submitting batch");
            let receipt = self.backend.submit_batch(&batch).await.or_raise(|| ErrorKind::Submission {
                file: file.name.clone(),
                batch: batch.number,
                total,
            })?;
            submissions += receipt.submissions;
        }
        let deleted = if self.options.delete_after_success {
            self.directory.delete(file).await.or_raise(|| ErrorKind::Deletion(file.path.clone()))?;
            tracing::info!("Deleted processed file");
            true
        } else {
            false
        };
        Ok(FileReport {
            name: file.name.clone(),
            prompts: prompts.len(),
            batches: total,
            submissions,
            deleted,
        })
    }

    /// Check the backend, then process prompt files until done.
    ///
    /// One-shot mode processes whatever is there once (or nothing) and
    /// returns. Continuous mode rescans every `rescan_interval` until the
    /// shutdown token is cancelled. Per-file failures are logged and counted;
    /// only an unavailable backend (or, in one-shot mode, an unreadable
    /// prompts directory) fails the run.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        self.backend
            .check_liveness()
            .await
            .or_raise(|| ErrorKind::BackendUnavailable(self.backend.name().to_string()))?;
        let root = self.directory.root();
        if self.options.continuous {
            tracing::info!(
                path = %root.display(),
                interval = self.options.rescan_interval.as_secs(),
                "Running in continuous mode; checking for new prompt files periodically"
            );
        }
        'scan: loop {
            if self.shutdown.is_cancelled() {
                summary.interrupted = true;
                break 'scan;
            }
            summary.scans += 1;
            let files = match self.scan().await {
                Ok(files) => files,
                Err(err) if self.options.continuous => {
                    tracing::warn!(error = ?err, "Could not scan prompts directory; trying again later");
                    Vec::new()
                },
                Err(err) => return Err(err),
            };
            if files.is_empty() {
                if !self.options.continuous {
                    tracing::info!(path = %root.display(), "No prompt files found");
                    break 'scan;
                }
                tracing::debug!(path = %root.display(), "No prompt files found; waiting");
            } else {
                tracing::info!(count = files.len(), "Found prompt files to process");
                for file in &files {
                    if self.shutdown.is_cancelled() {
                        summary.interrupted = true;
                        break 'scan;
                    }
                    match self.process_file(file).await {
                        Ok(report) => {
                            tracing::info!(file = %file.name, batches = report.batches, "Finished prompt file");
                            summary.record(&report);
                        },
                        Err(err) => {
                            summary.failed += 1;
                            tracing::error!(file = %file.name, error = ?err, "Prompt file failed; leaving it in place");
                        },
                    }
                }
                if !self.options.continuous {
                    break 'scan;
                }
                tracing::info!("All prompt files processed; waiting for new ones");
            }
            if !self.pause().await {
                summary.interrupted = true;
                break 'scan;
            }
        }
        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            deleted = summary.deleted,
            interrupted = summary.interrupted,
            "Batch processing complete"
        );
        Ok(summary)
    }

    /// Wait for the rescan interval. Returns `false` if shutdown was requested.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.options.rescan_interval) => true,
        }
    }
}
