//! Submission side of the job system.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

use bazaar_core::{DomainError, UserId};

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobId};

/// Enqueues jobs and wakes the executor; request handlers only ever touch this.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    wake: Arc<Notify>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    pub(crate) fn wake_signal(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub fn submit(&self, job: Job) -> Result<JobId, JobStoreError> {
        let kind = job.kind();
        let owner = job.owner;
        let id = self.store.enqueue(job)?;
        info!(job_id = %id, kind = kind.as_str(), owner = %owner, "job enqueued");
        self.wake.notify_one();
        Ok(id)
    }

    /// Current state of a job owned by `owner`. Foreign jobs read as missing.
    pub fn status(&self, owner: UserId, id: JobId) -> Result<Job, JobStoreError> {
        match self.store.get(owner, id) {
            Ok(Some(job)) => Ok(job),
            Ok(None) | Err(JobStoreError::NotOwner(_)) => Err(JobStoreError::NotFound(id)),
            Err(e) => Err(e),
        }
    }

    pub fn retry(&self, owner: UserId, id: JobId) -> Result<Job, JobStoreError> {
        let job = match self.store.retry_failed(owner, id) {
            Err(JobStoreError::NotOwner(_)) => Err(JobStoreError::NotFound(id)),
            other => other,
        }?;
        self.wake.notify_one();
        Ok(job)
    }

    /// Poll until the job reaches a terminal state or `limit` elapses.
    pub async fn wait_for_terminal(
        &self,
        owner: UserId,
        id: JobId,
        limit: Duration,
    ) -> Result<Job, JobStoreError> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let job = self.status(owner, id)?;
            if job.status.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(job);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl From<JobStoreError> for DomainError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) | JobStoreError::NotOwner(id) => {
                DomainError::not_found(format!("job {id}"))
            }
            JobStoreError::NotFailed(id) => {
                DomainError::invalid_transition(format!("job {id} has not failed"))
            }
            JobStoreError::AlreadyExists(id) => DomainError::constraint(format!("job {id} exists")),
            JobStoreError::Storage(msg) => DomainError::storage(msg),
        }
    }
}
