//! Single-worker task queue.
//!
//! Units of work are named futures pushed onto an unbounded channel. One
//! long-lived tokio task owns the receiving end and runs them strictly one
//! at a time, in submission order. The worker starts when the queue is
//! created and exits once every [`TaskQueue`] handle has been dropped.
//!
//! Nothing is persisted: queued work is lost if the process exits.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Task {
    name: String,
    job: Job,
}

#[derive(Debug, Default)]
struct QueueState {
    queued: usize,
    running: Option<String>,
}

/// Snapshot reported by `GET /queue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub running: Option<String>,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task queue worker has stopped")]
    Closed,
    #[error("task '{0}' did not complete")]
    Dropped(String),
}

/// Cloneable handle to the queue. All clones feed the same worker.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Task>,
    state: Arc<Mutex<QueueState>>,
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl TaskQueue {
    /// Create the queue and spawn its worker. Must be called from within a
    /// tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Task>();
        let state = Arc::new(Mutex::new(QueueState::default()));
        tokio::spawn(run_worker(rx, state.clone()));
        Self { tx, state }
    }

    /// Queue `fut` and return immediately.
    pub fn enqueue<F>(&self, name: impl Into<String>, fut: F) -> Result<(), QueueError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        lock(&self.state).queued += 1;
        let task = Task {
            name,
            job: Box::pin(fut),
        };
        if let Err(mpsc::error::SendError(task)) = self.tx.send(task) {
            lock(&self.state).queued -= 1;
            tracing::warn!(task = %task.name, "task queue closed, dropping task");
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// Queue `fut` and return a receiver for its output.
    pub fn submit<F, T>(
        &self,
        name: impl Into<String>,
        fut: F,
    ) -> Result<oneshot::Receiver<T>, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(name, async move {
            // The caller may have stopped waiting; the work still ran.
            let _ = done_tx.send(fut.await);
        })?;
        Ok(done_rx)
    }

    /// Queue `fut` and wait for its output.
    pub async fn run<F, T>(&self, name: impl Into<String>, fut: F) -> Result<T, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let name = name.into();
        let rx = self.submit(name.clone(), fut)?;
        rx.await.map_err(|_| QueueError::Dropped(name))
    }

    pub fn status(&self) -> QueueStatus {
        let state = lock(&self.state);
        QueueStatus {
            queued: state.queued,
            running: state.running.clone(),
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Task>, state: Arc<Mutex<QueueState>>) {
    while let Some(task) = rx.recv().await {
        {
            let mut s = lock(&state);
            s.queued = s.queued.saturating_sub(1);
            s.running = Some(task.name.clone());
        }
        tracing::debug!(task = %task.name, "task started");

        // Spawned so a panicking task is reported instead of killing the worker.
        match tokio::spawn(task.job).await {
            Ok(()) => tracing::debug!(task = %task.name, "task finished"),
            Err(e) => tracing::error!(task = %task.name, error = %e, "task failed"),
        }

        lock(&state).running = None;
    }
    tracing::debug!("task queue worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_tasks_in_submission_order() {
        let queue = TaskQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5u64 {
            let seen = seen.clone();
            queue
                .enqueue(format!("t{}", i), async move {
                    // Later tasks sleep less; order must still hold.
                    tokio::time::sleep(Duration::from_millis(25 - i * 5)).await;
                    seen.lock().unwrap().push(i);
                })
                .unwrap();
        }
        queue.run("last", async {}).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn never_runs_two_tasks_at_once() {
        let queue = TaskQueue::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for i in 0..6 {
            let active = active.clone();
            let peak = peak.clone();
            queue
                .enqueue(format!("t{}", i), async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        queue.run("drain", async {}).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_returns_output() {
        let queue = TaskQueue::new();
        let rx = queue.submit("add", async { 2 + 2 }).unwrap();
        assert_eq!(rx.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn status_reports_running_and_queued() {
        let queue = TaskQueue::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        queue
            .enqueue("blocker", async move {
                let _ = release_rx.await;
            })
            .unwrap();
        queue.enqueue("waiting", async {}).unwrap();

        for _ in 0..100 {
            if queue.status().running.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            queue.status(),
            QueueStatus {
                queued: 1,
                running: Some("blocker".into()),
            }
        );

        release_tx.send(()).unwrap();
        queue.run("drain", async {}).await.unwrap();
        let status = queue.status();
        assert_eq!(status.queued, 0);
    }

    #[tokio::test]
    async fn panicking_task_does_not_stop_worker() {
        let queue = TaskQueue::new();
        let rx = queue
            .submit("boom", async {
                panic!("task blew up");
            })
            .unwrap();
        assert!(rx.await.is_err());
        assert_eq!(queue.run("after", async { "ok" }).await.unwrap(), "ok");
    }
}
