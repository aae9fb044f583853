//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::debug;

use bazaar_core::UserId;

use super::types::{Job, JobId, JobStatus};

/// Job store abstraction.
pub trait JobStore: Send + Sync {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError>;

    /// Get a job on behalf of `owner`.
    fn get(&self, owner: UserId, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Claim the oldest ready job and mark it running.
    fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    /// Re-queue a terminally failed job with a fresh attempt budget.
    fn retry_failed(&self, owner: UserId, job_id: JobId) -> Result<Job, JobStoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {0} belongs to another account")]
    NotOwner(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("job {0} is not in a failed state")]
    NotFailed(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

fn poisoned<T>(_: T) -> JobStoreError {
    JobStoreError::Storage("job store lock poisoned".into())
}

/// Finished jobs kept for status lookups before the oldest are dropped.
pub const DEFAULT_FINISHED_RETENTION: usize = 1000;

/// Process-local job store. Pending and running jobs are always kept;
/// succeeded and failed ones are capped at `retention`, oldest first out.
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    retention: usize,
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self {
            jobs: RwLock::default(),
            retention: DEFAULT_FINISHED_RETENTION,
        }
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    fn prune_finished(&self, jobs: &mut HashMap<JobId, Job>) {
        let mut finished: Vec<(chrono::DateTime<Utc>, JobId)> = jobs
            .values()
            .filter(|j| j.status.is_terminal())
            .map(|j| (j.updated_at, j.id))
            .collect();
        if finished.len() <= self.retention {
            return;
        }
        finished.sort_unstable();
        let excess = finished.len() - self.retention;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }
        debug!(dropped = excess, "pruned finished jobs");
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    fn get(&self, owner: UserId, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        match jobs.get(&job_id) {
            Some(job) if job.owner == owner => Ok(Some(job.clone())),
            Some(_) => Err(JobStoreError::NotOwner(job_id)),
            None => Ok(None),
        }
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        match jobs.get_mut(&job.id) {
            Some(slot) => *slot = job.clone(),
            None => return Err(JobStoreError::NotFound(job.id)),
        }
        if job.status.is_terminal() {
            self.prune_finished(&mut jobs);
        }
        Ok(())
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let now = Utc::now();

        let next = jobs
            .values()
            .filter(|j| j.status.is_claimable() && j.is_ready(now))
            .min_by_key(|j| (j.created_at, j.id.0))
            .map(|j| j.id);

        Ok(next.and_then(|id| {
            jobs.get_mut(&id).map(|job| {
                job.mark_running();
                job.clone()
            })
        }))
    }

    fn retry_failed(&self, owner: UserId, job_id: JobId) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let job = jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?;
        if job.owner != owner {
            return Err(JobStoreError::NotOwner(job_id));
        }
        if !matches!(job.status, JobStatus::Failed { .. }) {
            return Err(JobStoreError::NotFailed(job_id));
        }
        job.reset_for_retry();
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobPayload;
    use bazaar_core::OrderId;

    fn notify_job(owner: i64) -> Job {
        Job::new(
            UserId::new(owner),
            JobPayload::NotifyOrderPlaced {
                buyer_id: UserId::new(owner),
                order_id: OrderId::new(1),
            },
        )
    }

    #[test]
    fn enqueue_and_claim_fifo() {
        let store = InMemoryJobStore::new();
        let older = notify_job(1);
        let mut newer = notify_job(1);
        newer.created_at = older.created_at + chrono::Duration::milliseconds(1);
        let second = store.enqueue(newer).unwrap();
        let first = store.enqueue(older).unwrap();

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, first);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempt, 1);

        assert_eq!(store.claim_next().unwrap().unwrap().id, second);
        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn jobs_are_private_to_their_owner() {
        let store = InMemoryJobStore::new();
        let id = store.enqueue(notify_job(1)).unwrap();
        assert!(store.get(UserId::new(1), id).unwrap().is_some());
        assert!(matches!(
            store.get(UserId::new(2), id),
            Err(JobStoreError::NotOwner(_))
        ));
    }

    #[test]
    fn backoff_delays_claim() {
        let store = InMemoryJobStore::new();
        store.enqueue(notify_job(1)).unwrap();
        let mut claimed = store.claim_next().unwrap().unwrap();
        claimed.mark_failed("smtp down".into(), Utc::now());
        store.update(&claimed).unwrap();

        // Default policy schedules the next run in the future.
        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn retry_failed_requeues_only_failed_jobs() {
        let store = InMemoryJobStore::new();
        let id = store.enqueue(notify_job(1)).unwrap();
        assert!(matches!(
            store.retry_failed(UserId::new(1), id),
            Err(JobStoreError::NotFailed(_))
        ));

        let mut claimed = store.claim_next().unwrap().unwrap();
        claimed.mark_fatal("bad".into(), Utc::now());
        store.update(&claimed).unwrap();

        let retried = store.retry_failed(UserId::new(1), id).unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.attempt, 0);
        assert!(store.claim_next().unwrap().is_some());
    }

    #[test]
    fn finished_jobs_beyond_retention_are_dropped_oldest_first() {
        let store = InMemoryJobStore::new().with_retention(2);
        let waiting = store.enqueue(notify_job(9)).unwrap();
        let mut finished = Vec::new();
        for owner in 1..=3 {
            let id = store.enqueue(notify_job(owner)).unwrap();
            let mut job = store.get(UserId::new(owner), id).unwrap().unwrap();
            job.mark_running();
            job.mark_succeeded(Utc::now(), None);
            job.updated_at = job.created_at + chrono::Duration::seconds(owner);
            store.update(&job).unwrap();
            finished.push((owner, id));
        }

        let (oldest_owner, oldest) = finished[0];
        assert!(store.get(UserId::new(oldest_owner), oldest).unwrap().is_none());
        for &(owner, id) in &finished[1..] {
            assert!(store.get(UserId::new(owner), id).unwrap().is_some());
        }
        assert!(store.get(UserId::new(9), waiting).unwrap().is_some());
    }
}
