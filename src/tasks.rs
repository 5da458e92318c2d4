//! Tracking of spawned background work such as downloads.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Identifier of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Default)]
struct Running {
    count: AtomicUsize,
    idle: Notify,
}

/// Held by every spawned task; dropped on completion and on abort alike.
struct RunningGuard(Arc<Running>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Owns spawned tasks so they can be cancelled or awaited.
///
/// Dropping the tracker does not stop its tasks; call [`shutdown`](TaskTracker::shutdown).
#[derive(Default)]
pub struct TaskTracker {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TaskId, JoinHandle<()>>>,
    running: Arc<Running>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` on the runtime. Failures are logged with `label`.
    pub fn spawn<F, T, E>(&self, label: impl Into<String>, work: F) -> TaskId
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let label = label.into();
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.running.count.fetch_add(1, Ordering::AcqRel);
        let guard = RunningGuard(Arc::clone(&self.running));
        let handle = tokio::spawn(async move {
            let _guard = guard;
            match work.await {
                Ok(_) => debug!("Task {} finished", label),
                Err(e) => warn!("Task {} failed: {}", label, e),
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|_, handle| !handle.is_finished());
        tasks.insert(id, handle);
        id
    }

    /// Abort a task. Returns false if it was unknown or already finished.
    pub fn cancel(&self, id: TaskId) -> bool {
        match self.tasks.lock().remove(&id) {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Number of tracked tasks that are neither finished nor cancelled.
    pub fn active(&self) -> usize {
        let mut tasks = self.tasks.lock();
        tasks.retain(|_, handle| !handle.is_finished());
        tasks.len()
    }

    /// Wait until every spawned task has finished or been aborted.
    ///
    /// Cancel-safe: dropping this future leaves the tasks tracked.
    pub async fn wait_all(&self) {
        loop {
            let idle = self.running.idle.notified();
            if self.running.count.load(Ordering::Acquire) == 0 {
                break;
            }
            idle.await;
        }
        self.tasks.lock().retain(|_, handle| !handle.is_finished());
    }

    /// Abort every task and wait for them to stop.
    pub async fn shutdown(&self) {
        for (_, handle) in self.tasks.lock().drain() {
            handle.abort();
        }
        self.wait_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_all_runs_tasks_to_completion() {
        let tracker = TaskTracker::new();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let done = Arc::clone(&done);
            tracker.spawn("count", async move {
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            });
        }
        tracker.spawn("fails", async { Err::<(), _>("boom") });
        tracker.wait_all().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_shutdown_stop_work() {
        let tracker = TaskTracker::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let spawn_slow = |tracker: &TaskTracker| {
            let finished = Arc::clone(&finished);
            tracker.spawn("slow", async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
        };

        let first = spawn_slow(&tracker);
        spawn_slow(&tracker);
        spawn_slow(&tracker);
        assert_eq!(tracker.active(), 3);

        assert!(tracker.cancel(first));
        assert!(!tracker.cancel(first));
        assert_eq!(tracker.active(), 2);

        tracker.shutdown().await;
        assert_eq!(tracker.active(), 0);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
