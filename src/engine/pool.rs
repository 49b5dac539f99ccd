//! Bounded task pool for batch members.
//!
//! Two semaphores bound the pool: `slots` caps queued plus running tasks,
//! `workers` caps the tasks running at once. Results are collected in
//! submission order, each with its own timeout; the first failure aborts
//! every sibling still pending.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{CubeError, CubeResult};

/// What to do with a submission when every queue slot is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPolicy {
    /// Wait for a slot.
    #[default]
    Block,
    /// Fail the batch with [`CubeError::Rejected`].
    Reject,
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: Arc<Semaphore>,
    slots: Arc<Semaphore>,
    max_pending: usize,
    policy: RejectionPolicy,
    timeout: Duration,
}

/// Aborts every task it still holds when dropped.
struct Batch<T> {
    handles: Vec<JoinHandle<CubeResult<T>>>,
}

impl<T> Drop for Batch<T> {
    fn drop(&mut self) {
        let mut cancelled = 0;
        for handle in &self.handles {
            if !handle.is_finished() {
                handle.abort();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            warn!(cancelled, "cancelled outstanding batch members");
        }
    }
}

impl WorkerPool {
    pub fn new(
        max_concurrency: usize,
        max_pending: usize,
        policy: RejectionPolicy,
        timeout: Duration,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        let max_pending = max_pending.max(max_concurrency);
        Self {
            workers: Arc::new(Semaphore::new(max_concurrency)),
            slots: Arc::new(Semaphore::new(max_pending)),
            max_pending,
            policy,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn admit(&self) -> CubeResult<OwnedSemaphorePermit> {
        let slots = Arc::clone(&self.slots);
        let permit = match self.policy {
            RejectionPolicy::Block => slots.acquire_owned().await.ok(),
            RejectionPolicy::Reject => slots.try_acquire_owned().ok(),
        };
        permit.ok_or(CubeError::Rejected {
            pending: self.max_pending,
        })
    }

    /// Run every job and return their outputs in submission order.
    pub async fn run_all<T, F>(&self, jobs: Vec<F>) -> CubeResult<Vec<T>>
    where
        T: Send + 'static,
        F: Future<Output = CubeResult<T>> + Send + 'static,
    {
        let mut batch = Batch {
            handles: Vec::with_capacity(jobs.len()),
        };
        for job in jobs {
            let slot = self.admit().await?;
            let workers = Arc::clone(&self.workers);
            batch.handles.push(tokio::spawn(async move {
                let _slot = slot;
                let _worker = workers
                    .acquire_owned()
                    .await
                    .map_err(|e| CubeError::TaskFailed(e.to_string()))?;
                job.await
            }));
        }

        let mut results = Vec::with_capacity(batch.handles.len());
        for (index, handle) in batch.handles.iter_mut().enumerate() {
            match tokio::time::timeout(self.timeout, handle).await {
                Ok(Ok(Ok(rows))) => results.push(rows),
                Ok(Ok(Err(e))) => return Err(e),
                Ok(Err(join)) => return Err(CubeError::TaskFailed(join.to_string())),
                Err(_) => {
                    warn!(index, timeout = ?self.timeout, "batch member timed out");
                    return Err(CubeError::Timeout {
                        index,
                        timeout: self.timeout,
                    });
                }
            }
        }
        Ok(results)
    }
}
