use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout, Duration};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;

/// One mutex per route job. Every mutation of a job or its bids runs while
/// holding that job's guard; different jobs never contend.
pub struct JobLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    timeout: Duration,
}

pub type JobGuard = OwnedMutexGuard<()>;

impl JobLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    pub async fn acquire(&self, job_id: Uuid) -> Result<JobGuard, AppError> {
        let lock = self
            .locks
            .entry(job_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        timeout(self.timeout, lock.lock_owned()).await.map_err(|_| {
            warn!(job_id = %job_id, timeout_ms = self.timeout.as_millis() as u64, "job lock timed out");
            AppError::LockTimeout(job_id)
        })
    }

    /// Drops the lock entry of a job that will never be mutated again.
    pub fn release(&self, job_id: &Uuid) {
        self.locks
            .remove_if(job_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Duration;
    use uuid::Uuid;

    use super::JobLocks;
    use crate::error::AppError;

    #[tokio::test]
    async fn second_acquire_times_out_while_guard_is_held() {
        let locks = JobLocks::new(Duration::from_millis(20));
        let job_id = Uuid::from_u128(1);

        let _guard = locks.acquire(job_id).await.unwrap();
        let err = locks.acquire(job_id).await.unwrap_err();

        assert!(matches!(err, AppError::LockTimeout(id) if id == job_id));
    }

    #[tokio::test]
    async fn different_jobs_do_not_contend() {
        let locks = JobLocks::new(Duration::from_millis(20));

        let _first = locks.acquire(Uuid::from_u128(1)).await.unwrap();
        assert!(locks.acquire(Uuid::from_u128(2)).await.is_ok());
    }

    #[tokio::test]
    async fn lock_is_reusable_after_guard_drops() {
        let locks = JobLocks::new(Duration::from_millis(20));
        let job_id = Uuid::from_u128(1);

        drop(locks.acquire(job_id).await.unwrap());
        assert!(locks.acquire(job_id).await.is_ok());
    }
}
