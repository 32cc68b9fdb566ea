//! Bounded blocking worker pool and cooperative time budgets.
//!
//! Enumeration, search and indexing do synchronous filesystem and CPU work.
//! They run on tokio's blocking threads, but never more than `size` at once,
//! so one expensive scan cannot starve the async runtime or unrelated
//! requests. Each job carries a [`Deadline`] and stops itself when the
//! budget runs out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{Result, WorkspaceError};

/// A wall-clock cutoff checked cooperatively by long-running jobs.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Self::after(Duration::MAX)
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// Runs blocking jobs with bounded concurrency.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool that runs at most `size` jobs concurrently.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of idle worker slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `f` on a blocking thread once a slot is free.
    pub async fn run<F, T>(&self, job: &'static str, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| WorkspaceError::Internal("worker pool closed".to_string()))?;

        debug!(job, available = self.available(), "Dispatching blocking job");
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| WorkspaceError::Internal(format!("{job} worker failed: {e}")))
    }
}
