//! Core job types and policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_catalog::FeedSource;
use bazaar_core::{OrderId, UserId};

/// Unique job identifier (the handle returned to submitters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Job kind, used to route a job to its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ImportPriceList,
    NotifyOrderPlaced,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ImportPriceList => "import_price_list",
            JobKind::NotifyOrderPlaced => "notify_order_placed",
        }
    }
}

/// Typed job payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    ImportPriceList { source: FeedSource, user_id: UserId },
    NotifyOrderPlaced { buyer_id: UserId, order_id: OrderId },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::ImportPriceList { .. } => JobKind::ImportPriceList,
            JobPayload::NotifyOrderPlaced { .. } => JobKind::NotifyOrderPlaced,
        }
    }
}

/// Job execution status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, waiting to be picked up
    Pending,
    /// Currently being executed
    Running,
    /// Last attempt failed; scheduled again after backoff
    Retrying { error: String, attempt: u32 },
    /// Finished successfully
    Succeeded,
    /// Terminal failure (fatal error or retries exhausted)
    Failed { reason: String, attempts: u32 },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed { .. })
    }

    pub fn is_claimable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Retrying { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending | JobStatus::Retrying { .. } => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// base * 2^(attempt-1)
    #[default]
    Exponential,
    /// base * attempt
    Linear,
}

/// Retry policy. `max_attempts` counts every run, the first one included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Run once; any failure is terminal.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Delay before the run following `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
        };
        delay.min(self.max_delay)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// A background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Account that submitted the job; only it may read the job back.
    pub owner: UserId,
    pub payload: JobPayload,
    pub status: JobStatus,
    pub retry_policy: RetryPolicy,
    /// Runs started so far.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Earliest time of the next run (backoff).
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Handler output of the successful run.
    pub output: Option<serde_json::Value>,
    pub history: Vec<JobAttemptRecord>,
}

/// Record of a job execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl Job {
    pub fn new(owner: UserId, payload: JobPayload) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            owner,
            payload,
            status: JobStatus::Pending,
            retry_policy: RetryPolicy::default(),
            attempt: 0,
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            output: None,
            history: Vec::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.is_none_or(|at| now >= at)
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.attempt += 1;
        self.updated_at = Utc::now();
    }

    pub fn mark_succeeded(&mut self, started_at: DateTime<Utc>, output: Option<serde_json::Value>) {
        self.record(started_at, None);
        self.status = JobStatus::Succeeded;
        self.output = output;
        self.scheduled_at = None;
    }

    /// Retriable failure: schedule another run if the policy allows it.
    pub fn mark_failed(&mut self, error: String, started_at: DateTime<Utc>) {
        self.record(started_at, Some(error.clone()));
        if self.retry_policy.should_retry(self.attempt) {
            let delay = self.retry_policy.delay_for_attempt(self.attempt);
            self.scheduled_at =
                Some(self.updated_at + chrono::Duration::from_std(delay).unwrap_or_default());
            self.status = JobStatus::Retrying {
                error,
                attempt: self.attempt,
            };
        } else {
            self.status = JobStatus::Failed {
                reason: error,
                attempts: self.attempt,
            };
        }
    }

    /// Non-retriable failure.
    pub fn mark_fatal(&mut self, reason: String, started_at: DateTime<Utc>) {
        self.record(started_at, Some(reason.clone()));
        self.status = JobStatus::Failed {
            reason,
            attempts: self.attempt,
        };
        self.scheduled_at = None;
    }

    /// Put a failed job back in the queue with a fresh attempt budget.
    pub fn reset_for_retry(&mut self) {
        self.status = JobStatus::Pending;
        self.attempt = 0;
        self.scheduled_at = None;
        self.updated_at = Utc::now();
    }

    fn record(&mut self, started_at: DateTime<Utc>, error: Option<String>) {
        let now = Utc::now();
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            error,
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
        });
    }
}

/// Result of one handler run.
#[derive(Debug)]
pub enum JobResult {
    /// Done; optional output is stored on the job.
    Success(Option<serde_json::Value>),
    /// Transient failure, retried per the job's policy.
    Failure(String),
    /// Business failure, never retried.
    Fatal(String),
}
