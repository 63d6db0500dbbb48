// src/data/messages.rs

use pgvector::Vector;
use serde_json::Value;
use sqlx::FromRow;

use crate::db::Db;

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub channel_id: String,
    pub ts: String,
    pub parent_ts: Option<String>,
    pub attrs: Value,
    pub embedding: Option<Vector>,
}

/// Inserts a top-level message. Conflict on (channel, ts) is a no-op success
/// — ingestion re-pages overlapping ranges and relies on this idempotence.
pub async fn add_message<'c>(exec: impl Db<'c>, channel_id: &str, ts: &str, attrs: &Value) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO messages (channel_id, ts, parent_ts, attrs)
        VALUES ($1, $2, NULL, $3)
        ON CONFLICT (channel_id, ts) DO NOTHING
        "#,
    )
    .bind(channel_id)
    .bind(ts)
    .bind(attrs)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Batch form of [`add_message`]. One statement per row, same conflict
/// policy. Takes the transaction directly (rather than a generic executor)
/// because ingestion always calls this as one step of a larger commit
/// (bulk-insert, advance watermark, fan out jobs, all atomically).
pub async fn add_messages(
    tx: &mut sqlx::PgConnection,
    channel_id: &str,
    batch: &[(String, Value)],
) -> sqlx::Result<u64> {
    let mut inserted = 0;
    for (ts, attrs) in batch {
        if add_message(&mut *tx, channel_id, ts, attrs).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

pub async fn add_thread_message<'c>(
    exec: impl Db<'c>,
    channel_id: &str,
    parent_ts: &str,
    ts: &str,
    attrs: &Value,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO messages (channel_id, ts, parent_ts, attrs)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (channel_id, ts) DO NOTHING
        "#,
    )
    .bind(channel_id)
    .bind(ts)
    .bind(parent_ts)
    .bind(attrs)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_thread_messages(
    tx: &mut sqlx::PgConnection,
    channel_id: &str,
    parent_ts: &str,
    batch: &[(String, Value)],
) -> sqlx::Result<u64> {
    let mut inserted = 0;
    for (ts, attrs) in batch {
        if add_thread_message(&mut *tx, channel_id, parent_ts, ts, attrs).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

/// Shallow-merges `delta` into the stored `attrs` at the top level and
/// optionally sets the embedding. Uses jsonb `||` so unrelated keys survive.
pub async fn update_message_attrs<'c>(
    exec: impl Db<'c>,
    channel_id: &str,
    ts: &str,
    delta_attrs: &Value,
    embedding: Option<Vector>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE messages
        SET attrs = attrs || $3,
            embedding = COALESCE($4, embedding)
        WHERE channel_id = $1 AND ts = $2
        "#,
    )
    .bind(channel_id)
    .bind(ts)
    .bind(delta_attrs)
    .bind(embedding)
    .execute(exec)
    .await?;
    Ok(())
}

/// Atomically adjusts `attrs.reactions.<name>` by `delta`; removes the key
/// if the resulting count is ≤ 0. Reactions never hold zero or negative
/// counts, so this is expressed as a single jsonb round-trip guarded
/// by the invariant rather than two statements.
pub async fn update_reaction<'c>(
    exec: impl Db<'c>,
    channel_id: &str,
    ts: &str,
    name: &str,
    delta: i64,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE messages
        SET attrs = CASE
            WHEN COALESCE((attrs #>> ARRAY['reactions', $3])::bigint, 0) + $4 <= 0
                THEN attrs #- ARRAY['reactions', $3]
            ELSE jsonb_set(
                jsonb_set(attrs, ARRAY['reactions'], COALESCE(attrs->'reactions', '{}'::jsonb)),
                ARRAY['reactions', $3],
                to_jsonb(COALESCE((attrs #>> ARRAY['reactions', $3])::bigint, 0) + $4)
            )
        END
        WHERE channel_id = $1 AND ts = $2
        "#,
    )
    .bind(channel_id)
    .bind(ts)
    .bind(name)
    .bind(delta)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn get<'c>(exec: impl Db<'c>, channel_id: &str, ts: &str) -> sqlx::Result<Option<Message>> {
    sqlx::query_as::<_, Message>(
        "SELECT channel_id, ts, parent_ts, attrs, embedding FROM messages WHERE channel_id = $1 AND ts = $2",
    )
    .bind(channel_id)
    .bind(ts)
    .fetch_optional(exec)
    .await
}

/// Top-level messages in `[since, until]`, ascending by ts, for the weekly
/// report and the ingestion re-page cursor.
pub async fn list_top_level_in_range<'c>(
    exec: impl Db<'c>,
    channel_id: &str,
    since: &str,
    until: &str,
) -> sqlx::Result<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT channel_id, ts, parent_ts, attrs, embedding
        FROM messages
        WHERE channel_id = $1 AND parent_ts IS NULL AND ts >= $2 AND ts <= $3
        ORDER BY ts ASC
        "#,
    )
    .bind(channel_id)
    .bind(since)
    .bind(until)
    .fetch_all(exec)
    .await
}
