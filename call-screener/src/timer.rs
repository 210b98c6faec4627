//! Cancellable deferred work on the tokio runtime.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// A unit of work scheduled to run after a delay.
///
/// Dropping the handle detaches the task; only [`DelayedTask::cancel`]
/// stops it.
#[derive(Debug)]
pub struct DelayedTask {
    handle: JoinHandle<()>,
}

impl DelayedTask {
    /// Run `work` once `delay` has elapsed
    pub fn schedule<F>(delay: Duration, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Holds at most one pending [`DelayedTask`]
#[derive(Debug, Default)]
pub struct TaskSlot {
    pending: Mutex<Option<DelayedTask>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `work`, cancelling whatever was pending
    pub fn replace<F>(&self, delay: Duration, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = DelayedTask::schedule(delay, work);
        let mut pending = self.lock();
        if let Some(previous) = pending.replace(task) {
            trace!("Cancelling previously scheduled task");
            previous.cancel();
        }
    }

    /// Cancel the pending task, if any. Returns whether one was still running.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(task) => {
                let was_running = !task.is_finished();
                task.cancel();
                was_running
            }
            None => false,
        }
    }

    /// Whether a task is scheduled and has not completed
    pub fn is_pending(&self) -> bool {
        self.lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<DelayedTask>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
