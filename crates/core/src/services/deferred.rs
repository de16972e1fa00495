//! Deferred post-commit work.
//!
//! Services enqueue best-effort follow-up only after a transaction commits.
//! Tasks run asynchronously in queue order; failures are the task's own
//! responsibility to log and must never propagate back to the committed
//! operation.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A simple post-commit task queue.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<BoxedTask>,
}

impl TaskQueue {
    /// Create a queue and spawn its worker on the current runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<BoxedTask>();

        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                task.await;
            }
        });

        Self { tx }
    }

    /// Enqueue a task. Dropped (with a warning) if the worker is gone.
    pub fn enqueue<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(Box::pin(task)).is_err() {
            tracing::warn!("Deferred task dropped: queue worker has shut down");
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_tasks_run_in_order() {
        let queue = TaskQueue::new();
        let counter = Arc::new(AtomicU32::new(0));
        let (done_tx, done_rx) = oneshot::channel();

        let c1 = counter.clone();
        queue.enqueue(async move {
            c1.fetch_add(1, Ordering::SeqCst);
        });

        let c2 = counter.clone();
        queue.enqueue(async move {
            c2.fetch_add(1, Ordering::SeqCst);
            let _ = done_tx.send(());
        });

        done_rx.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_worker() {
        let queue = TaskQueue::new();
        let (done_tx, done_rx) = oneshot::channel();

        queue.enqueue(async {
            // A task that "fails" just logs and returns.
            tracing::warn!("simulated best-effort failure");
        });
        queue.enqueue(async move {
            let _ = done_tx.send(());
        });

        done_rx.await.unwrap();
    }
}
