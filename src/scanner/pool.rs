//! Bounded worker pool for node scans
//!
//! Tasks are spawned on the tokio runtime and run once they hold one of
//! `worker_count` permits. With a queue limit set, at most that many tasks are
//! in flight (queued or running) and dispatch waits for room. CPU-bound
//! decoding goes through [`run_blocking`]; the runtime recycles idle blocking
//! threads after its keep-alive.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{Result, ValidationError};

#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: Arc<Semaphore>,
    queue: Option<Arc<Semaphore>>,
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(worker_count: usize, queue_limit: Option<usize>) -> Self {
        let worker_count = worker_count.max(1);
        Self {
            workers: Arc::new(Semaphore::new(worker_count)),
            queue: queue_limit.map(|limit| Arc::new(Semaphore::new(limit.max(1)))),
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Dispatch a task. Waits for queue room first when a queue limit is set.
    pub async fn spawn<F, T>(&self, task: F) -> Result<JoinHandle<Result<T>>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let queued = match &self.queue {
            Some(queue) => Some(Arc::clone(queue).acquire_owned().await.map_err(|_| {
                ValidationError::Concurrency {
                    details: "Scan queue closed".to_string(),
                }
            })?),
            None => None,
        };
        let workers = Arc::clone(&self.workers);

        Ok(tokio::spawn(async move {
            let _queued = queued;
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|_| ValidationError::Concurrency {
                    details: "Worker pool closed".to_string(),
                })?;
            task.await
        }))
    }

    /// Wait for every task, in dispatch order. Panicked or cancelled tasks
    /// come back as errors.
    pub async fn join<T>(handles: Vec<JoinHandle<Result<T>>>) -> Vec<Result<T>> {
        join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.map_err(|e| ValidationError::Concurrency {
                    details: format!("Task join error: {}", e),
                })?
            })
            .collect()
    }
}

/// Run CPU-bound work off the async workers
pub async fn run_blocking<F, T>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ValidationError::Concurrency {
            details: e.to_string(),
        })?
}
