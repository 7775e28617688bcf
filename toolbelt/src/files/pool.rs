//! Bounded pool for blocking filesystem work.
//!
//! Directory creation, writes and deletes all use blocking `std::fs` calls. They run on tokio's
//! blocking thread pool, gated by a semaphore so that at most `workers` jobs are in flight at
//! once. Callers await the job without holding up other request tasks.

use std::{io, sync::Arc};

use tokio::sync::Semaphore;
use tracing::trace;

/// Fixed-size pool that runs blocking jobs off the async request tasks.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl BlockingPool {
    /// Creates a pool allowing `workers` concurrent jobs. A value of 0 is raised to 1.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of jobs that could start right now without waiting.
    fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on the blocking pool once a worker slot is free, and await its result.
    ///
    /// The slot is held until the job returns, even if the awaiting future is dropped first.
    pub async fn run<F, T>(&self, job: F) -> io::Result<T>
    where
        F: FnOnce() -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| io::Error::other("worker pool is closed"))?;

        trace!(available = self.available(), "Running blocking job");

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| io::Error::other(format!("blocking job failed: {e}")))?
    }
}
