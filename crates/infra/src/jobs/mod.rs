//! Background jobs: price-list imports and order notifications.
//!
//! ## Design
//!
//! - Jobs are owned by the submitting account and carry a typed payload
//! - Retry policy with backoff; handlers mark business failures as fatal
//! - Each run is bounded by a timeout
//! - Request handlers submit through [`JobQueue`] and never await completion
//!
//! ## Components
//!
//! - `Job`: job record with payload, status, attempts and output
//! - `JobStore`: persistence for jobs
//! - `JobQueue`: submission, status lookup, manual retry
//! - `JobExecutor`: claims and runs jobs on the tokio runtime

pub mod executor;
pub mod queue;
pub mod store;
pub mod types;

pub use executor::{ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobHandler};
pub use queue::JobQueue;
pub use store::{DEFAULT_FINISHED_RETENTION, InMemoryJobStore, JobStore, JobStoreError};
pub use types::{
    BackoffStrategy, Job, JobAttemptRecord, JobId, JobKind, JobPayload, JobResult, JobStatus,
    RetryPolicy,
};
