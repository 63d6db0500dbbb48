// src/periodic/retention.rs
// LLM-usage retention purge: fires once per day, deletes usage rows
// older than the configured retention, self-reschedules for next midnight.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::llm::LLMUsageCleanupConfig;
use crate::data::llm_usage;
use crate::db::Pool;
use crate::error::{CoreError, CoreResult};
use crate::jobs::{EnqueueOptions, NewJob};

pub const KIND: &str = "purge_llm_usage";
const QUEUE_UNIQUE_KEY: &str = "purge_llm_usage";

#[derive(Debug, Serialize, Deserialize)]
pub struct Args {
    pub retention_days: i64,
}

/// Next run: the following UTC midnight, expressed as an explicit
/// self-reschedule (like ingestion's) since the substrate already models
/// that pattern.
pub fn initial_job(config: &LLMUsageCleanupConfig) -> anyhow::Result<NewJob> {
    let next_midnight = next_utc_midnight();
    Ok(NewJob::new(KIND, Args { retention_days: config.default_retention_days })?
        .with_opts(EnqueueOptions::default().unique_by_args(QUEUE_UNIQUE_KEY).scheduled_at(next_midnight)))
}

fn next_utc_midnight() -> chrono::DateTime<chrono::Utc> {
    let now = chrono::Utc::now();
    (now + chrono::Duration::days(1)).date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc()
}

pub async fn run(pool: Pool, job_id: i64, args: Args) -> CoreResult<()> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(args.retention_days);
    let purged = llm_usage::purge_older_than(&pool, cutoff).await.map_err(CoreError::from)?;
    info!(purged, retention_days = args.retention_days, "llm usage retention purge complete");

    let mut tx = pool.begin().await.map_err(CoreError::from)?;
    let next = NewJob::new(KIND, Args { retention_days: args.retention_days }).map_err(CoreError::from)?.with_opts(
        crate::jobs::EnqueueOptions::default()
            .unique_by_args(QUEUE_UNIQUE_KEY)
            .scheduled_at(next_utc_midnight()),
    );
    // Complete this job before enqueuing its successor: the pending-job
    // unique index still counts this row while it's `running`, so enqueuing
    // first would resolve to this same row and insert nothing.
    crate::jobs::complete_in_tx(&mut tx, job_id).await.map_err(CoreError::from)?;
    crate::jobs::enqueue(&mut *tx, next).await.map_err(CoreError::from)?;
    tx.commit().await.map_err(CoreError::from)?;

    Ok(())
}
