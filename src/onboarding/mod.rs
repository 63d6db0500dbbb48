// src/onboarding/mod.rs
// Channel onboarding and historical thread backfill.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::chat::ChatGateway;
use crate::data::{channels, messages};
use crate::data::channels::OnboardingStatus;
use crate::db::Pool;
use crate::error::CoreError;
use crate::jobs::{queue, EnqueueOptions, NewJob};

pub const CHANNEL_ONBOARD_KIND: &str = "channel_onboard";
pub const BACKFILL_THREAD_KIND: &str = "backfill_thread";

const DEFAULT_LAST_N: usize = 1000;

#[derive(Debug, Serialize, Deserialize)]
pub struct OnboardArgs {
    pub channel: String,
    #[serde(default = "default_last_n")]
    pub last_n: usize,
}

fn default_last_n() -> usize {
    DEFAULT_LAST_N
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackfillThreadArgs {
    pub channel: String,
    pub parent_ts: String,
}

/// Fetches channel info, then the most recent `last_n` messages; inserts
/// them all as backfill-sourced, marks onboarding finished, and fans out one
/// `BackfillThread` per message with replies — all in a single transaction
/// (5-minute worker timeout).
pub async fn run_channel_onboard(pool: Pool, gateway: Arc<dyn ChatGateway>, job_id: i64, args: OnboardArgs) -> crate::error::CoreResult<()> {
    channels::get_or_create(&pool, &args.channel).await.map_err(CoreError::from)?;
    channels::set_onboarding_status(&pool, &args.channel, OnboardingStatus::InProgress)
        .await
        .map_err(CoreError::from)?;

    let info = gateway.get_conversation_info(&args.channel).await?;

    let mut recent = Vec::new();
    let mut cursor = None;
    loop {
        let page = gateway
            .get_conversation_history(&args.channel, "0.000000", &ingestion_now_ts(), cursor.as_deref())
            .await?;
        recent.extend(page.messages);
        if !page.has_more || recent.len() >= args.last_n {
            break;
        }
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }
    recent.truncate(args.last_n);

    let reply_bearing: Vec<_> = recent.iter().filter(|m| m.reply_count > 0).cloned().collect();
    let rows: Vec<(String, serde_json::Value)> = recent
        .iter()
        .map(|m| {
            let mut attrs = m.attrs.clone();
            if let Some(obj) = attrs.as_object_mut() {
                obj.insert("source".to_string(), json!("backfill"));
            }
            (m.ts.clone(), attrs)
        })
        .collect();

    let mut tx = pool.begin().await.map_err(CoreError::from)?;

    messages::add_messages(&mut *tx, &args.channel, &rows).await.map_err(CoreError::from)?;
    channels::set_name(&mut *tx, &args.channel, &info.name).await.map_err(CoreError::from)?;
    channels::set_onboarding_status(&mut *tx, &args.channel, OnboardingStatus::Finished)
        .await
        .map_err(CoreError::from)?;

    let mut fan_out = Vec::new();
    for msg in &reply_bearing {
        fan_out.push(
            NewJob::new(BACKFILL_THREAD_KIND, BackfillThreadArgs { channel: args.channel.clone(), parent_ts: msg.ts.clone() })?
                .with_opts(EnqueueOptions::default().unique_by_args(format!("{}:{}", args.channel, msg.ts))),
        );
    }
    queue::enqueue_many(&mut tx, fan_out).await.map_err(CoreError::from)?;
    queue::complete_in_tx(&mut tx, job_id).await.map_err(CoreError::from)?;

    tx.commit().await.map_err(CoreError::from)?;

    info!(channel = %args.channel, inserted = recent.len(), "channel onboarding complete");
    Ok(())
}

/// Pages replies for `parent_ts`, bulk-inserts them via `AddThreadMessage`,
/// and fans out module-dispatcher jobs tagged `is_backfill = true` so
/// backfill-eligible modules can re-run over historical threads.
pub async fn run_backfill_thread(pool: Pool, gateway: Arc<dyn ChatGateway>, job_id: i64, args: BackfillThreadArgs) -> crate::error::CoreResult<()> {
    let mut replies = Vec::new();
    let mut cursor = None;
    loop {
        let page = gateway.get_conversation_replies(&args.channel, &args.parent_ts, cursor.as_deref()).await?;
        replies.extend(page.messages);
        if !page.has_more {
            break;
        }
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }
    // The parent itself is included in the replies page by convention; drop it.
    replies.retain(|m| m.ts != args.parent_ts);

    let rows: Vec<(String, serde_json::Value)> = replies.iter().map(|m| (m.ts.clone(), m.attrs.clone())).collect();

    let mut tx = pool.begin().await.map_err(CoreError::from)?;
    messages::add_thread_messages(&mut tx, &args.channel, &args.parent_ts, &rows).await.map_err(CoreError::from)?;

    let mut fan_out = Vec::new();
    for msg in &replies {
        fan_out.push(NewJob::new(
            crate::modules::KIND,
            json!({
                "channel": args.channel,
                "ts": msg.ts,
                "parent_ts": args.parent_ts,
                "is_backfill": true,
            }),
        )?);
    }
    queue::enqueue_many(&mut tx, fan_out).await.map_err(CoreError::from)?;
    queue::complete_in_tx(&mut tx, job_id).await.map_err(CoreError::from)?;
    tx.commit().await.map_err(CoreError::from)?;

    info!(channel = %args.channel, parent_ts = %args.parent_ts, replies = replies.len(), "thread backfill complete");
    Ok(())
}

fn ingestion_now_ts() -> String {
    let now = chrono::Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}
