//! Job executor with retry, backoff and per-run timeouts.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Notify, Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::queue::JobQueue;
use super::store::JobStore;
use super::types::{Job, JobKind, JobResult, JobStatus};

/// Runs one kind of job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> JobResult;

    /// Upper bound for one run; `None` uses the executor default.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// How often to poll when nothing wakes the executor
    pub poll_interval: Duration,
    /// Maximum jobs running at once
    pub max_concurrent: usize,
    /// Name for logging
    pub name: String,
    /// Per-run timeout for handlers without their own
    pub default_timeout: Duration,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_concurrent: 4,
            name: "job-executor".to_string(),
            default_timeout: Duration::from_secs(60),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_retried: u64,
    pub jobs_failed: u64,
    pub current_running: usize,
    pub uptime_secs: u64,
}

#[derive(Debug)]
struct Counters {
    processed: AtomicU64,
    succeeded: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    running: AtomicUsize,
    started: Instant,
}

impl Counters {
    fn new() -> Self {
        Self {
            processed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            running: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    fn record(&self, status: &JobStatus) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match status {
            JobStatus::Succeeded => &self.succeeded,
            JobStatus::Failed { .. } => &self.failed,
            _ => &self.retried,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ExecutorStats {
        ExecutorStats {
            jobs_processed: self.processed.load(Ordering::Relaxed),
            jobs_succeeded: self.succeeded.load(Ordering::Relaxed),
            jobs_retried: self.retried.load(Ordering::Relaxed),
            jobs_failed: self.failed.load(Ordering::Relaxed),
            current_running: self.running.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

/// Handle to a running executor. Dropping it stops the executor loop.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
    stats: Arc<Counters>,
}

impl JobExecutorHandle {
    /// Stop claiming jobs and wait for in-flight ones to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats.snapshot()
    }
}

/// Background job executor.
///
/// Claims ready jobs from the store, runs them with the handler registered for
/// their kind, and records success, retry or terminal failure.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    wake: Arc<Notify>,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    pub fn new(queue: &JobQueue) -> Self {
        Self {
            store: queue.store(),
            wake: queue.wake_signal(),
            handlers: HashMap::new(),
        }
    }

    pub fn register_handler(&mut self, kind: JobKind, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Spawn the executor loop on the current tokio runtime.
    pub fn spawn(self, config: JobExecutorConfig) -> JobExecutorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(Counters::new());
        let join = tokio::spawn(executor_loop(
            Arc::new(self),
            config,
            shutdown_rx,
            stats.clone(),
        ));

        JobExecutorHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }

    /// Run an already-claimed job once and persist the outcome.
    pub async fn execute_one(&self, job: &mut Job, default_timeout: Duration) -> Result<(), String> {
        let started = Utc::now();
        let Some(handler) = self.handlers.get(&job.kind()).cloned() else {
            let error = format!("no handler for job kind: {}", job.kind().as_str());
            warn!(job_id = %job.id, error = %error, "no handler for job");
            job.mark_fatal(error.clone(), started);
            self.store.update(job).map_err(|e| e.to_string())?;
            return Err(error);
        };

        let limit = handler.timeout().unwrap_or(default_timeout);
        let result = match tokio::time::timeout(limit, handler.handle(job)).await {
            Ok(result) => result,
            Err(_) => JobResult::Failure(format!("timed out after {}s", limit.as_secs_f64())),
        };

        let outcome = match result {
            JobResult::Success(output) => {
                job.mark_succeeded(started, output);
                Ok(())
            }
            JobResult::Failure(error) => {
                job.mark_failed(error.clone(), started);
                Err(error)
            }
            JobResult::Fatal(reason) => {
                job.mark_fatal(reason.clone(), started);
                Err(reason)
            }
        };
        self.store.update(job).map_err(|e| e.to_string())?;
        outcome
    }
}

async fn executor_loop(
    executor: Arc<JobExecutor>,
    config: JobExecutorConfig,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<Counters>,
) {
    let max_concurrent = config.max_concurrent.max(1);
    info!(executor = %config.name, max_concurrent, "job executor started");
    let permits = Arc::new(Semaphore::new(max_concurrent));

    loop {
        if *shutdown.borrow() {
            break;
        }

        let permit = tokio::select! {
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() { break; }
                continue;
            }
        };

        match executor.store.claim_next() {
            Ok(Some(mut job)) => {
                debug!(executor = %config.name, job_id = %job.id, kind = job.kind().as_str(), attempt = job.attempt, "claimed job");
                let executor = executor.clone();
                let stats = stats.clone();
                let default_timeout = config.default_timeout;
                stats.running.fetch_add(1, Ordering::Relaxed);
                tokio::spawn(async move {
                    let _permit = permit;
                    let result = executor.execute_one(&mut job, default_timeout).await;
                    stats.running.fetch_sub(1, Ordering::Relaxed);
                    stats.record(&job.status);
                    match (result, &job.status) {
                        (Ok(()), _) => info!(job_id = %job.id, kind = job.kind().as_str(), "job succeeded"),
                        (Err(e), JobStatus::Failed { .. }) => {
                            warn!(job_id = %job.id, kind = job.kind().as_str(), error = %e, "job failed")
                        }
                        (Err(e), _) => {
                            debug!(job_id = %job.id, error = %e, status = ?job.status, "job will be retried")
                        }
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                tokio::select! {
                    _ = executor.wake.notified() => {}
                    _ = tokio::time::sleep(config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() { break; }
                    }
                }
            }
            Err(e) => {
                drop(permit);
                error!(executor = %config.name, error = %e, "failed to claim job");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }

    // Wait for in-flight jobs.
    let _ = permits.acquire_many(max_concurrent as u32).await;
    info!(executor = %config.name, "job executor stopped");
}
