//! Delayed task scheduling
//!
//! Channel deletion after close runs through [`TaskScheduler`] so it can be
//! cancelled, and so tests can drive elapsed time with [`ManualScheduler`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A unit of deferred work
pub type ScheduledJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to a scheduled job
#[derive(Debug, Clone)]
pub struct TaskHandle {
    label: String,
    token: CancellationToken,
}

impl TaskHandle {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            token: CancellationToken::new(),
        }
    }

    /// Prevent the job from running if it has not started yet
    pub fn cancel(&self) {
        debug!(task = %self.label, "Cancelling scheduled task");
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Runs jobs after a delay
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, label: &str, delay: Duration, job: ScheduledJob) -> TaskHandle;
}

/// Scheduler backed by the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl TaskScheduler for TokioScheduler {
    fn schedule(&self, label: &str, delay: Duration, job: ScheduledJob) -> TaskHandle {
        let handle = TaskHandle::new(label);
        let token = handle.token.clone();
        let label = label.to_string();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!(task = %label, "Scheduled task cancelled before running");
                }
                () = tokio::time::sleep(delay) => {
                    job.await;
                }
            }
        });
        handle
    }
}

struct PendingJob {
    due: Duration,
    handle: TaskHandle,
    job: ScheduledJob,
}

/// Scheduler whose clock is advanced explicitly
#[derive(Default)]
pub struct ManualScheduler {
    elapsed: Mutex<Duration>,
    pending: Mutex<Vec<PendingJob>>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs scheduled but not yet run or dropped
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Labels of pending jobs, in scheduling order
    #[must_use]
    pub fn pending_labels(&self) -> Vec<String> {
        lock(&self.pending)
            .iter()
            .map(|p| p.handle.label.clone())
            .collect()
    }

    /// Move time forward and run every job that became due
    ///
    /// Cancelled jobs are dropped without running. Returns how many jobs ran.
    pub async fn advance(&self, by: Duration) -> usize {
        let now = {
            let mut elapsed = lock(&self.elapsed);
            *elapsed += by;
            *elapsed
        };

        let due: Vec<PendingJob> = {
            let mut pending = lock(&self.pending);
            let (due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut *pending)
                .into_iter()
                .partition(|p| p.due <= now || p.handle.is_cancelled());
            *pending = rest;
            due
        };

        let mut ran = 0;
        for pending in due {
            if pending.handle.is_cancelled() {
                continue;
            }
            pending.job.await;
            ran += 1;
        }
        ran
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule(&self, label: &str, delay: Duration, job: ScheduledJob) -> TaskHandle {
        let handle = TaskHandle::new(label);
        let due = *lock(&self.elapsed) + delay;
        lock(&self.pending).push(PendingJob {
            due,
            handle: handle.clone(),
            job,
        });
        handle
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
