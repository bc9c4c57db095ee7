//! Shared in-process task queue.
//!
//! The driver side pushes [`GenerationTask`]s onto a [`TaskQueue`] and polls
//! them; the generation worker (part of the embedding application) takes
//! tasks off the queue and reports progress back through the task.
//!
//! A task moves through `Queued → Processing → Finished | Failed`. Images the
//! worker produces are pushed as pending outputs until the driver drains them.

use promptdrop_prompts::Prompt;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, Notify};

use crate::GenerationParams;

/// Lifecycle of a [`GenerationTask`] as reported by the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting on the queue; no worker has taken it yet.
    Queued,
    Processing,
    Finished,
    Failed(String),
}
impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_))
    }
}

struct Progress {
    status: TaskStatus,
    outputs: VecDeque<PathBuf>,
}

/// A unit of work for the generation worker.
pub struct GenerationTask {
    pub id: u64,
    pub prompt: Prompt,
    /// Number of images to generate for `prompt`.
    pub image_number: usize,
    pub params: GenerationParams,
    /// Where images should be written; `None` means the worker's default.
    pub output_dir: Option<PathBuf>,
    progress: Mutex<Progress>,
}
impl GenerationTask {
    pub(crate) fn new(
        id: u64,
        prompt: Prompt,
        image_number: usize,
        params: GenerationParams,
        output_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            id,
            prompt,
            image_number,
            params,
            output_dir,
            progress: Mutex::new(Progress {
                status: TaskStatus::Queued,
                outputs: VecDeque::new(),
            }),
        }
    }

    pub async fn status(&self) -> TaskStatus {
        self.progress.lock().await.status.clone()
    }

    pub async fn is_processing(&self) -> bool {
        self.progress.lock().await.status == TaskStatus::Processing
    }

    /// Number of produced images nobody has collected yet.
    pub async fn pending_outputs(&self) -> usize {
        self.progress.lock().await.outputs.len()
    }

    /// Snapshot the status and collect pending outputs in one step, so an
    /// output pushed right before `finish()` is never missed.
    pub async fn poll(&self) -> (TaskStatus, Vec<PathBuf>) {
        let mut progress = self.progress.lock().await;
        let outputs = progress.outputs.drain(..).collect();
        (progress.status.clone(), outputs)
    }

    /// Worker side: the task has been picked up.
    pub async fn start(&self) {
        self.progress.lock().await.status = TaskStatus::Processing;
    }

    /// Worker side: an image has been written.
    pub async fn push_output(&self, path: impl Into<PathBuf>) {
        self.progress.lock().await.outputs.push_back(path.into());
    }

    /// Worker side: all images for this task have been produced.
    pub async fn finish(&self) {
        self.progress.lock().await.status = TaskStatus::Finished;
    }

    /// Worker side: generation failed and will not complete.
    pub async fn fail(&self, reason: impl Into<String>) {
        self.progress.lock().await.status = TaskStatus::Failed(reason.into());
    }
}

/// Process-wide list of pending generation tasks.
///
/// Cloning is cheap; every clone refers to the same queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Arc<Mutex<VecDeque<Arc<GenerationTask>>>>,
    notify: Arc<Notify>,
    next_id: Arc<AtomicU64>,
}
impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Append a task and wake up a waiting worker.
    pub async fn push(&self, task: Arc<GenerationTask>) {
        self.tasks.lock().await.push_back(task);
        self.notify.notify_one();
    }

    /// Take the oldest task, if there is one.
    pub async fn take(&self) -> Option<Arc<GenerationTask>> {
        self.tasks.lock().await.pop_front()
    }

    /// Wait until a task is available and take it.
    pub async fn next(&self) -> Arc<GenerationTask> {
        loop {
            if let Some(task) = self.take().await {
                return task;
            }
            self.notify.notified().await;
        }
    }

    /// Remove a task that no worker has taken yet. Returns `false` if it was
    /// already taken.
    pub async fn withdraw(&self, task: &Arc<GenerationTask>) -> bool {
        let mut tasks = self.tasks.lock().await;
        match tasks.iter().position(|queued| Arc::ptr_eq(queued, task)) {
            Some(index) => tasks.remove(index).is_some(),
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}
