// src/jobs/periodic.rs
//
// Cron-driven job registration. A periodic source is a
// cron expression plus a constructor producing the next `Enqueue` call;
// evaluated at fire time only. Missed fires during downtime are not
// backfilled — this is a plain "sleep until next instant,
// enqueue, repeat" loop, not a catch-up scheduler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::db::Pool;

use super::queue;
use super::types::NewJob;

type ConstructFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<NewJob>>> + Send>> + Send + Sync>;

pub struct PeriodicSource {
    name: String,
    schedule: Schedule,
    construct: ConstructFn,
}

impl PeriodicSource {
    /// `cron_expr` is a standard 5-field `min hour dom mon dow` expression;
    /// the `cron` crate's 7-field parser expects a leading seconds field
    /// too, so a literal `"0"` is prepended.
    pub fn new<F, Fut>(name: impl Into<String>, cron_expr: &str, construct: F) -> anyhow::Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<NewJob>>> + Send + 'static,
    {
        let full_expr = format!("0 {cron_expr}");
        let schedule = Schedule::try_from(full_expr.as_str())?;
        Ok(Self {
            name: name.into(),
            schedule,
            construct: Arc::new(move || Box::pin(construct())),
        })
    }
}

/// Runs every registered source's own fire loop concurrently until
/// `shutdown` is cancelled.
pub async fn run_all(pool: Pool, sources: Vec<PeriodicSource>, shutdown: CancellationToken) {
    let mut handles = Vec::new();
    for source in sources {
        let pool = pool.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(run_source(pool, source, shutdown)));
    }
    for handle in handles {
        let _ = handle.await;
    }
}

async fn run_source(pool: Pool, source: PeriodicSource, shutdown: CancellationToken) {
    loop {
        let next_fire = match source.schedule.upcoming(chrono::Utc).next() {
            Some(at) => at,
            None => {
                error!(source = %source.name, "cron schedule produced no upcoming fire time");
                return;
            }
        };

        let now = chrono::Utc::now();
        let sleep_for = (next_fire - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(source = %source.name, "periodic source shutting down");
                return;
            }
            _ = tokio::time::sleep(sleep_for) => {}
        }

        info!(source = %source.name, fire_time = %next_fire, "periodic source firing");
        match (source.construct)().await {
            Ok(jobs) => {
                let mut tx = match pool.begin().await {
                    Ok(tx) => tx,
                    Err(err) => {
                        error!(source = %source.name, error = %err, "failed to open transaction for periodic enqueue");
                        continue;
                    }
                };
                if let Err(err) = queue::enqueue_many(&mut tx, jobs).await {
                    error!(source = %source.name, error = %err, "periodic enqueue failed");
                    continue;
                }
                if let Err(err) = tx.commit().await {
                    error!(source = %source.name, error = %err, "periodic enqueue commit failed");
                }
            }
            Err(err) => {
                error!(source = %source.name, error = %err, "periodic constructor failed");
            }
        }
    }
}
