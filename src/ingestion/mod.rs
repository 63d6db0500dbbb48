// src/ingestion/mod.rs
//
// Watermark-driven ingestion. One job of this kind is kept in the queue
// per channel at all times (enforced via `unique_by_args`). Each run
// computes `latest`, pages history, and commits the bulk insert + watermark
// advance + job fan-out as one transaction — the ingestion job's own
// completion commits in that same transaction so progress and the
// watermark never diverge.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::chat::ChatGateway;
use crate::data::{channels, messages};
use crate::db::Pool;
use crate::error::{CoreError, CoreResult};
use crate::jobs::{queue, EnqueueOptions, NewJob};

pub const KIND: &str = "ingest_channel";
const PAGE_CAP: usize = 1000;
const IDLE_REQUEUE_DELAY: chrono::Duration = chrono::Duration::minutes(1);

#[derive(Debug, Serialize, Deserialize)]
pub struct Args {
    pub channel: String,
}

pub async fn unique_job(channel: &str) -> anyhow::Result<NewJob> {
    Ok(NewJob::new(KIND, Args { channel: channel.to_string() })?
        .with_opts(EnqueueOptions::default().unique_by_args(channel.to_string())))
}

fn next_ts(ts: &str) -> String {
    let parsed: f64 = ts.parse().unwrap_or(0.0);
    format!("{:.6}", parsed + 0.000_001)
}

fn now_ts() -> String {
    let now = chrono::Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

/// `latest = max(now, watermark + 1us)` — preserves `latest >= watermark`
/// even if the process clock regresses.
fn compute_latest(watermark: &str) -> String {
    let now = now_ts();
    let candidate = next_ts(watermark);
    if candidate.parse::<f64>().unwrap_or(0.0) > now.parse::<f64>().unwrap_or(0.0) {
        candidate
    } else {
        now
    }
}

pub async fn run(pool: Pool, gateway: std::sync::Arc<dyn ChatGateway>, job_id: i64, args: Args) -> CoreResult<()> {
    let channel = channels::get_or_create(&pool, &args.channel).await.map_err(CoreError::from)?;
    let latest = compute_latest(&channel.watermark);

    let mut batch = Vec::new();
    let mut cursor = None;
    let mut has_more = true;

    while has_more && batch.len() < PAGE_CAP {
        let page = gateway
            .get_conversation_history(&args.channel, &channel.watermark, &latest, cursor.as_deref())
            .await?;
        has_more = page.has_more;
        cursor = page.next_cursor.clone();
        batch.extend(page.messages);
        if cursor.is_none() {
            break;
        }
    }

    batch.sort_by(|a, b| {
        a.ts.parse::<f64>()
            .unwrap_or(0.0)
            .partial_cmp(&b.ts.parse::<f64>().unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    batch.truncate(PAGE_CAP);

    let top_level: Vec<_> = batch.iter().filter(|m| m.parent_ts.is_none()).cloned().collect();
    let reply_bearing: Vec<_> = batch.iter().filter(|m| m.reply_count > 0).cloned().collect();

    let mut tx = pool.begin().await.map_err(CoreError::from)?;

    let rows: Vec<(String, serde_json::Value)> = batch.iter().map(|m| (m.ts.clone(), m.attrs.clone())).collect();
    let inserted = messages::add_messages(&mut *tx, &args.channel, &rows).await.map_err(CoreError::from)?;

    channels::set_watermark(&mut *tx, &args.channel, &latest).await.map_err(CoreError::from)?;

    let mut fan_out = Vec::new();
    for msg in &top_level {
        fan_out.push(NewJob::new(
            crate::incidents::KIND,
            json!({"channel": args.channel, "ts": msg.ts, "is_backfill": false}),
        )?);
        fan_out.push(NewJob::new(
            crate::modules::KIND,
            json!({"channel": args.channel, "ts": msg.ts, "parent_ts": null, "is_backfill": false}),
        )?);
    }
    for msg in &reply_bearing {
        fan_out.push(
            NewJob::new(crate::onboarding::BACKFILL_THREAD_KIND, json!({"channel": args.channel, "parent_ts": msg.ts}))?
                .with_opts(EnqueueOptions::default().unique_by_args(format!("{}:{}", args.channel, msg.ts))),
        );
    }

    let self_opts = if has_more {
        EnqueueOptions::default().unique_by_args(args.channel.clone())
    } else {
        EnqueueOptions::default()
            .unique_by_args(args.channel.clone())
            .scheduled_at(chrono::Utc::now() + IDLE_REQUEUE_DELAY)
    };
    fan_out.push(NewJob::new(KIND, Args { channel: args.channel.clone() })?.with_opts(self_opts));

    // Complete this job before enqueuing its self-reschedule: the pending-job
    // unique index still counts this row while it's `running`, so enqueueing
    // the replacement first would resolve to this same row and insert
    // nothing. Completing first moves this row out of the index.
    queue::complete_in_tx(&mut tx, job_id).await.map_err(CoreError::from)?;
    queue::enqueue_many(&mut tx, fan_out).await.map_err(CoreError::from)?;

    tx.commit().await.map_err(CoreError::from)?;

    crate::metrics::record_ingestion_page(&args.channel, inserted);
    info!(channel = %args.channel, inserted, has_more, "ingestion page committed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_never_regresses_behind_watermark() {
        let watermark = "1700000000.000000";
        let latest = compute_latest(watermark);
        assert!(latest.parse::<f64>().unwrap() > watermark.parse::<f64>().unwrap());
    }
}
