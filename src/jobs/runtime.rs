// src/jobs/runtime.rs
//
// Per-queue worker loops with a concurrency cap (default 10, `update_runbook`
// capped at 1), race-free claiming, and per-kind timeouts. One `tokio::spawn`ed
// loop per queue, `time::interval` + `MissedTickBehavior::Skip` for polling
// cadence, metrics recorded around each unit of work.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::db::Pool;
use crate::error::{CoreError, CoreErrorKind};

use super::middleware::run_with_middleware;
use super::queue;
use super::retry::backoff;
use super::types::JobRow;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type HandlerFn = Arc<dyn Fn(Pool, JobRow) -> BoxFuture<'static, Result<(), CoreError>> + Send + Sync>;

#[derive(Clone)]
pub struct KindSpec {
    pub queue: String,
    pub timeout: Option<Duration>,
    pub handler: HandlerFn,
}

/// Maps job `kind` to its handler, default queue, and timeout. Registered
/// once at startup (see `bootstrap`); immutable thereafter.
#[derive(Clone, Default)]
pub struct JobRegistry {
    kinds: HashMap<String, KindSpec>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, kind: &str, queue: &str, timeout: Option<Duration>, handler: F)
    where
        F: Fn(Pool, JobRow) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        self.kinds.insert(
            kind.to_string(),
            KindSpec {
                queue: queue.to_string(),
                timeout,
                handler: Arc::new(move |pool, row| Box::pin(handler(pool, row))),
            },
        );
    }

    fn get(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }
}

/// Per-queue concurrency caps. Unlisted queues fall back to `default_cap`.
#[derive(Clone)]
pub struct QueueCaps {
    caps: HashMap<String, usize>,
    default_cap: usize,
}

impl QueueCaps {
    pub fn new(default_cap: usize) -> Self {
        Self {
            caps: HashMap::new(),
            default_cap,
        }
    }

    pub fn set(mut self, queue: &str, cap: usize) -> Self {
        self.caps.insert(queue.to_string(), cap);
        self
    }

    fn cap_for(&self, queue: &str) -> usize {
        self.caps.get(queue).copied().unwrap_or(self.default_cap)
    }
}

impl Default for QueueCaps {
    fn default() -> Self {
        Self::new(10).set("update_runbook", 1)
    }
}

/// How long a job may sit in `running` with no worker heartbeat before
/// [`queue::reap_stale_running`] assumes its process died and recovers it.
/// Chosen to comfortably exceed the longest per-kind timeout in the
/// registry (the documentation refresh and classifier kinds run unbounded),
/// so a live, legitimately slow job is never mistaken for an orphan.
const STALE_RUNNING_LEASE: Duration = Duration::from_secs(60 * 60);
const REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct Runtime {
    pool: Pool,
    registry: Arc<JobRegistry>,
}

impl Runtime {
    pub fn new(pool: Pool, registry: JobRegistry) -> Self {
        Self {
            pool,
            registry: Arc::new(registry),
        }
    }

    /// Spawns one polling loop per distinct queue found in the registry plus
    /// the stale-running reaper, and runs until `shutdown` is cancelled.
    /// Returns once every loop has drained its in-flight work.
    pub async fn run(&self, queues: &[String], caps: QueueCaps, shutdown: CancellationToken) {
        let mut handles = Vec::new();
        for queue_name in queues {
            let cap = caps.cap_for(queue_name);
            let pool = self.pool.clone();
            let registry = self.registry.clone();
            let queue_name = queue_name.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                queue_loop(pool, registry, queue_name, cap, shutdown).await;
            }));
        }

        handles.push({
            let pool = self.pool.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { reap_loop(pool, shutdown).await })
        });

        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn reap_loop(pool: Pool, shutdown: CancellationToken) {
    let mut ticker = time::interval(REAP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match queue::reap_stale_running(&pool, STALE_RUNNING_LEASE).await {
            Ok(0) => {}
            Ok(count) => warn!(count, "recovered stale running jobs"),
            Err(err) => warn!(error = %err, "stale-running reap failed"),
        }
    }
}

async fn queue_loop(pool: Pool, registry: Arc<JobRegistry>, queue_name: String, cap: usize, shutdown: CancellationToken) {
    let semaphore = Arc::new(Semaphore::new(cap));
    let mut ticker = time::interval(Duration::from_millis(500));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(queue = %queue_name, "queue loop shutting down");
                break;
            }
            _ = ticker.tick() => {}
        }

        let available_permits = semaphore.available_permits();
        if available_permits == 0 {
            continue;
        }

        let claimed = match queue::claim(&pool, &queue_name, available_permits as i64).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(queue = %queue_name, error = %err, "claim failed");
                continue;
            }
        };

        for job in claimed {
            let Some(spec) = registry.get(&job.kind).cloned() else {
                warn!(kind = %job.kind, "no handler registered for job kind; discarding");
                let _ = queue::mark_discarded(&pool, job.id, "no handler registered").await;
                continue;
            };

            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let pool = pool.clone();
            tokio::spawn(async move {
                let _permit = permit;
                run_claimed_job(pool, job, spec).await;
            });
        }
    }
}

async fn run_claimed_job(pool: Pool, job: JobRow, spec: KindSpec) {
    let job_for_run = job.clone();
    let handler = spec.handler.clone();
    let pool_for_handler = pool.clone();

    let attempt = async move { (handler)(pool_for_handler, job_for_run).await };

    let result = match spec.timeout {
        Some(timeout) => match time::timeout(timeout, run_with_middleware(&job, || attempt)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::transient("job timed out")),
        },
        None => run_with_middleware(&job, || attempt).await,
    };

    match result {
        Ok(()) => {
            let mut tx = begin(&pool).await;
            if let Err(err) = queue::complete_in_tx(&mut tx, job.id).await {
                warn!(job_id = job.id, error = %err, "failed to mark job completed");
            }
            let _ = tx.commit().await;
        }
        Err(err) => match err.kind() {
            CoreErrorKind::NotFound | CoreErrorKind::Cancelled => {
                // Dropped silently: a missing message on a backfill race is
                // a successful no-op, not a failure.
                let mut tx = begin(&pool).await;
                let _ = queue::complete_in_tx(&mut tx, job.id).await;
                let _ = tx.commit().await;
            }
            CoreErrorKind::Permanent => {
                let _ = queue::mark_discarded(&pool, job.id, &err.to_string()).await;
            }
            CoreErrorKind::Transient => {
                let delay = backoff(job.attempt);
                let _ = queue::mark_retryable(&pool, job.id, delay, &err.to_string()).await;
            }
        },
    }
}

async fn begin(pool: &Pool) -> sqlx::Transaction<'static, sqlx::Postgres> {
    pool.begin().await.expect("failed to open completion transaction")
}
