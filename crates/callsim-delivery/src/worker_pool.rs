//! Bounded worker pool with backpressure.
//!
//! A fixed set of workers drains one bounded queue of capacity `2n`.
//! Submitting to a full queue suspends the caller until a worker frees a
//! slot, which is what caps outbound delivery concurrency at `n`.

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::error::{DeliveryError, Result};

type Job = BoxFuture<'static, ()>;

/// Fixed-size pool of executors fed by a bounded FIFO queue.
///
/// The pool holds no network state; it only runs the futures it is given.
/// Shut it down with [`WorkerPool::shutdown`] to drain queued work.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Spawns `worker_count` workers on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ConfigurationError` when `worker_count` is 0.
    pub fn new(worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(DeliveryError::configuration("worker pool needs at least one worker"));
        }

        let (sender, receiver) = mpsc::channel::<Job>(worker_count * 2);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let worker_handles = (0..worker_count)
            .map(|worker_id| {
                let receiver = receiver.clone();
                tokio::spawn(run_worker(worker_id, receiver))
            })
            .collect();

        info!(worker_count, queue_capacity = worker_count * 2, "worker pool started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker_handles: Mutex::new(worker_handles),
            worker_count,
        })
    }

    /// Number of executors.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Capacity of the task queue.
    pub fn queue_capacity(&self) -> usize {
        self.worker_count * 2
    }

    /// Whether [`WorkerPool::shutdown`] has been called.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    /// Enqueues a task, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::PoolClosed` after shutdown.
    pub async fn submit<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DeliveryError::PoolClosed)?;

        sender.send(task.boxed()).await.map_err(|_| DeliveryError::PoolClosed)
    }

    /// Runs `task` on a pooled worker and waits for its output.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::PoolClosed` after shutdown and
    /// `DeliveryError::TaskAborted` if the task panicked.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();

        self.submit(async move {
            let _ = result_tx.send(task.await);
        })
        .await?;

        result_rx
            .await
            .map_err(|_| DeliveryError::task_aborted("task ended before reporting a result"))
    }

    /// Closes the queue and waits for queued and in-flight tasks to finish.
    ///
    /// Calling it a second time is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` if the workers do not drain within
    /// `timeout`, or `WorkerPanic` if a worker task could not be joined.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        if sender.is_none() {
            return Ok(());
        }
        drop(sender);

        let handles =
            std::mem::take(&mut *self.worker_handles.lock().unwrap_or_else(PoisonError::into_inner));

        info!(
            worker_count = handles.len(),
            timeout_ms = timeout.as_millis(),
            "draining worker pool"
        );

        let drain = async {
            for (worker_id, handle) in handles.into_iter().enumerate() {
                if let Err(join_error) = handle.await {
                    error!(worker_id, error = %join_error, "worker task failed during shutdown");
                    return Err(DeliveryError::WorkerPanic {
                        worker_id,
                        error: join_error.to_string(),
                    });
                }
            }
            Ok(())
        };

        if let Ok(result) = tokio::time::timeout(timeout, drain).await {
            info!("worker pool shut down");
            result
        } else {
            error!(timeout_ms = timeout.as_millis(), "worker pool did not drain in time");
            Err(DeliveryError::ShutdownTimeout { timeout })
        }
    }

    /// Whether any worker task is still running.
    pub fn has_active_workers(&self) -> bool {
        self.worker_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|handle| !handle.is_finished())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let open = self.sender.get_mut().unwrap_or_else(PoisonError::into_inner).is_some();
        if open {
            warn!(
                worker_count = self.worker_count,
                "WorkerPool dropped without shutdown; queued tasks still drain in the background"
            );
        }
    }
}

async fn run_worker(worker_id: usize, receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>) {
    debug!(worker_id, "pool worker starting");

    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            error!(worker_id, "pooled task panicked");
        }
    }

    debug!(worker_id, "pool worker stopped");
}
