//! In-process queue backend.
//!
//! Used when the driver runs inside the generation application itself: tasks
//! are pushed onto the shared [`TaskQueue`] and polled until the worker is
//! done with them.

use crate::backend::{GenerationBackend, Receipt};
use crate::error::{ErrorKind, Result};
use crate::queue::{GenerationTask, TaskQueue, TaskStatus};
use crate::GenerationParams;
use async_trait::async_trait;
use promptdrop_prompts::{Batch, Prompt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const PREVIEW_CHARS: usize = 60;

/// How a batch is turned into generation tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskMode {
    /// One task per prompt, each generating a single image.
    #[default]
    PerPrompt,
    /// A single task carrying the batch's first prompt and asking for as many
    /// images as the batch has prompts. Every other prompt of the batch is
    /// ignored; only useful to reproduce the behaviour of older setups.
    FirstPrompt,
}

/// Settings for [`QueueBackend`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Where generated images go; `None` leaves it to the worker.
    pub output_dir: Option<PathBuf>,
    pub poll_interval_ms: u64,
    /// Give up on a task after this long. `None` waits forever, which blocks
    /// the driver indefinitely if the worker stalls.
    pub completion_timeout_secs: Option<u64>,
    pub task_mode: TaskMode,
}
impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            completion_timeout_secs: None,
            task_mode: TaskMode::default(),
        }
    }
}

/// Generation backend feeding an in-process [`TaskQueue`].
///
/// # Examples
///
/// ```
/// use promptdrop_backend::{GenerationParams, QueueBackend, QueueSettings, TaskQueue};
///
/// let queue = TaskQueue::new();
/// // Hand `queue.clone()` to the generation worker...
/// let backend = QueueBackend::new(queue, QueueSettings::default(), GenerationParams::default());
/// ```
#[derive(Clone)]
pub struct QueueBackend {
    name: String,
    queue: TaskQueue,
    settings: QueueSettings,
    params: GenerationParams,
}
impl QueueBackend {
    pub fn new(queue: TaskQueue, settings: QueueSettings, params: GenerationParams) -> Self {
        Self {
            name: "queue".to_string(),
            queue,
            settings,
            params,
        }
    }

    fn tasks_for(&self, batch: &Batch<'_>) -> Vec<Arc<GenerationTask>> {
        let task = |prompt: Prompt, images: usize| {
            let output_dir = self.settings.output_dir.clone();
            Arc::new(GenerationTask::new(self.queue.next_id(), prompt, images, self.params.clone(), output_dir))
        };
        match self.settings.task_mode {
            TaskMode::PerPrompt => batch.prompts.iter().map(|prompt| task(prompt.clone(), 1)).collect(),
            TaskMode::FirstPrompt => match batch.prompts.first() {
                Some(first) => vec![task(first.clone(), batch.len())],
                None => Vec::new(),
            },
        }
    }

    /// Poll until the worker has finished the task and every output has been
    /// collected. Returns the number of images produced.
    async fn wait_for(&self, task: &GenerationTask) -> Result<usize> {
        let interval = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        let deadline = self.settings.completion_timeout_secs.map(|secs| (secs, Instant::now() + Duration::from_secs(secs)));
        let mut produced = 0;
        loop {
            let (status, outputs) = task.poll().await;
            for output in outputs {
                produced += 1;
                tracing::info!(task = task.id, output = %output.display(), "Image generated");
            }
            match status {
                TaskStatus::Finished => return Ok(produced),
                TaskStatus::Failed(reason) => exn::bail!(ErrorKind::TaskFailed(reason)),
                TaskStatus::Queued | TaskStatus::Processing => {},
            }
            if let Some((secs, deadline)) = deadline
                && Instant::now() >= deadline
            {
                exn::bail!(ErrorKind::Timeout(secs));
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[async_trait]
impl GenerationBackend for QueueBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_liveness(&self) -> Result<()> {
        Ok(())
    }

    async fn submit_batch(&self, batch: &Batch<'_>) -> Result<Receipt> {
        if self.settings.task_mode == TaskMode::FirstPrompt && batch.len() > 1 {
            tracing::warn!(
                batch = batch.number,
                ignored = batch.len() - 1,
                "Only the first prompt of the batch is submitted in first-prompt mode"
            );
        }
        for (index, prompt) in batch.numbered() {
            tracing::info!(batch = batch.number, "[{index}] {}", prompt.preview(PREVIEW_CHARS));
        }
        let tasks = self.tasks_for(batch);
        for task in &tasks {
            self.queue.push(task.clone()).await;
        }
        tracing::info!(batch = batch.number, tasks = tasks.len(), "Waiting for generation to complete");
        let mut images = 0;
        for (position, task) in tasks.iter().enumerate() {
            match self.wait_for(task).await {
                Ok(produced) => images += produced,
                Err(err) => {
                    // Don't leave the rest of a failed batch for the worker.
                    for pending in &tasks[position..] {
                        self.queue.withdraw(pending).await;
                    }
                    return Err(err);
                },
            }
        }
        tracing::info!(batch = batch.number, images, "Generation complete");
        Ok(Receipt {
            prompts: batch.len(),
            submissions: tasks.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptdrop_prompts::{BatchSize, batches, parse};
    use rstest::rstest;

    fn backend(queue: &TaskQueue, settings: QueueSettings) -> QueueBackend {
        QueueBackend::new(queue.clone(), settings, GenerationParams::default())
    }

    fn fast() -> QueueSettings {
        QueueSettings {
            poll_interval_ms: 10,
            ..QueueSettings::default()
        }
    }

    /// Stand-in for the generation worker: takes `count` tasks, produces
    /// `image_number` outputs for each, and records what it saw.
    fn spawn_worker(queue: TaskQueue, count: usize) -> tokio::task::JoinHandle<Vec<(Prompt, usize)>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..count {
                let task = queue.next().await;
                task.start().await;
                for n in 0..task.image_number {
                    task.push_output(format!("outputs/{}-{n}.png", task.id)).await;
                }
                task.finish().await;
                seen.push((task.prompt.clone(), task.image_number));
            }
            seen
        })
    }

    #[rstest]
    #[case(TaskMode::PerPrompt, 3)]
    #[case(TaskMode::FirstPrompt, 1)]
    fn test_tasks_for_batch(#[case] mode: TaskMode, #[case] expected: usize) {
        let queue = TaskQueue::new();
        let settings = QueueSettings {
            task_mode: mode,
            output_dir: Some(PathBuf::from("out")),
            ..QueueSettings::default()
        };
        let backend = backend(&queue, settings);
        let prompts = parse("cat\ndog\nbird\n");
        let batch = batches(&prompts, BatchSize::default()).next().unwrap();
        let tasks = backend.tasks_for(&batch);
        assert_eq!(tasks.len(), expected);
        assert_eq!(tasks.iter().map(|t| t.image_number).sum::<usize>(), 3);
        assert_eq!(tasks[0].prompt.as_str(), "cat");
        assert!(tasks.iter().all(|t| t.output_dir.as_deref() == Some(std::path::Path::new("out"))));
    }

    #[tokio::test]
    async fn test_per_prompt_submission() {
        let queue = TaskQueue::new();
        let worker = spawn_worker(queue.clone(), 3);
        let backend = backend(&queue, fast());
        let prompts = parse("cat\ndog\nbird\n");
        let batch = batches(&prompts, BatchSize::default()).next().unwrap();
        let receipt = backend.submit_batch(&batch).await.unwrap();
        assert_eq!(receipt, Receipt { prompts: 3, submissions: 3 });
        let seen = worker.await.unwrap();
        let seen: Vec<(&str, usize)> = seen.iter().map(|(p, n)| (p.as_str(), *n)).collect();
        assert_eq!(seen, [("cat", 1), ("dog", 1), ("bird", 1)]);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_first_prompt_submission() {
        let queue = TaskQueue::new();
        let worker = spawn_worker(queue.clone(), 1);
        let settings = QueueSettings {
            task_mode: TaskMode::FirstPrompt,
            ..fast()
        };
        let backend = backend(&queue, settings);
        let prompts = parse("cat\ndog\n");
        let batch = batches(&prompts, BatchSize::default()).next().unwrap();
        let receipt = backend.submit_batch(&batch).await.unwrap();
        assert_eq!(receipt, Receipt { prompts: 2, submissions: 1 });
        let seen = worker.await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_str(), "cat");
        assert_eq!(seen[0].1, 2);
    }

    #[tokio::test]
    async fn test_failed_task_withdraws_the_rest() {
        let queue = TaskQueue::new();
        let worker_queue = queue.clone();
        let worker = tokio::spawn(async move {
            let task = worker_queue.next().await;
            task.start().await;
            task.fail("out of memory").await;
        });
        let backend = backend(&queue, fast());
        let prompts = parse("cat\ndog\nbird\n");
        let batch = batches(&prompts, BatchSize::default()).next().unwrap();
        let err = backend.submit_batch(&batch).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::TaskFailed(reason) if reason == "out of memory"));
        worker.await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_worker_times_out() {
        let queue = TaskQueue::new();
        let settings = QueueSettings {
            completion_timeout_secs: Some(5),
            ..QueueSettings::default()
        };
        let backend = backend(&queue, settings);
        let prompts = parse("cat\n");
        let batch = batches(&prompts, BatchSize::default()).next().unwrap();
        let started = Instant::now();
        let err = backend.submit_batch(&batch).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Timeout(5)));
        assert!(started.elapsed() >= Duration::from_secs(5));
        // Never picked up by a worker, so it was withdrawn.
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_deadline_keeps_waiting() {
        let queue = TaskQueue::new();
        let backend = backend(&queue, QueueSettings::default());
        let prompts = parse("cat\n");
        let batch = batches(&prompts, BatchSize::default()).next().unwrap();
        let submit = backend.submit_batch(&batch);
        let outcome = tokio::time::timeout(Duration::from_secs(3600), submit).await;
        assert!(outcome.is_err(), "submission should still be waiting on the worker");
    }
}
