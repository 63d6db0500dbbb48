// src/data/reports.rs

use serde_json::Value;
use sqlx::FromRow;

use crate::db::Db;

#[derive(Debug, Clone, FromRow)]
pub struct Report {
    pub channel_id: String,
    pub period_start: chrono::DateTime<chrono::Utc>,
    pub period_end: chrono::DateTime<chrono::Utc>,
    pub content: Value,
    pub posted_ts: Option<String>,
}

/// Records a generated weekly report. `posted_ts` is filled in after the
/// chat gateway accepts the post (a report can exist without one if posting
/// failed — the job retries the post, not the aggregation, on the next run).
pub async fn insert<'c>(
    exec: impl Db<'c>,
    channel_id: &str,
    period_start: chrono::DateTime<chrono::Utc>,
    period_end: chrono::DateTime<chrono::Utc>,
    content: &Value,
    posted_ts: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reports (channel_id, period_start, period_end, content, posted_ts)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(channel_id)
    .bind(period_start)
    .bind(period_end)
    .bind(content)
    .bind(posted_ts)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn latest_for_channel<'c>(exec: impl Db<'c>, channel_id: &str) -> sqlx::Result<Option<Report>> {
    sqlx::query_as::<_, Report>(
        r#"
        SELECT channel_id, period_start, period_end, content, posted_ts
        FROM reports
        WHERE channel_id = $1
        ORDER BY period_end DESC
        LIMIT 1
        "#,
    )
    .bind(channel_id)
    .fetch_optional(exec)
    .await
}
