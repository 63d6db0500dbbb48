// src/search/rrf.rs
//
// Reciprocal rank fusion over a lexical full-text rank
// (`ts_rank`/`plainto_tsquery`) and a vector-distance rank, across
// top-level, non-bot, non-incident messages in `interval`.

use pgvector::Vector;
use sqlx::FromRow;

use crate::db::Db;

#[derive(Debug, Clone, FromRow)]
pub struct ServiceUpdate {
    pub ts: String,
    pub attrs: serde_json::Value,
    pub rrf: f64,
}

/// Caps ranks at 1000 before combining (the pure-top-k variant, chosen over
/// an older ranks-capped-at-100 scheme) and returns the top 5 by combined
/// score.
pub async fn get_latest_service_updates<'c>(
    exec: impl Db<'c>,
    channel_id: &str,
    query_text: &str,
    query_vec: &Vector,
    bot_user_id: &str,
    since: chrono::DateTime<chrono::Utc>,
) -> sqlx::Result<Vec<ServiceUpdate>> {
    sqlx::query_as::<_, ServiceUpdate>(
        r#"
        WITH valid_messages AS (
            SELECT ts, attrs, embedding,
                   CASE
                       WHEN coalesce(attrs #>> '{message,text}', '') = '' THEN -1
                       ELSE ts_rank(
                           to_tsvector('english', attrs #>> '{message,text}'),
                           plainto_tsquery('english', $2)
                       )
                   END AS lexical_score
            FROM messages
            WHERE channel_id = $1
              AND parent_ts IS NULL
              AND created_at >= $5
              AND coalesce(attrs #>> '{message,user}', '') <> $4
              AND NOT (attrs ? 'incident_action' AND attrs -> 'incident_action' ->> 'action' <> 'none')
        ),
        ranked AS (
            SELECT ts, attrs,
                   row_number() OVER (ORDER BY embedding <-> $3) AS semantic_rank,
                   row_number() OVER (ORDER BY lexical_score DESC) AS lexical_rank
            FROM valid_messages
        )
        SELECT ts, attrs,
               (1.0 / (1 + least(semantic_rank, 1000))) + (1.0 / (1 + least(lexical_rank, 1000))) AS rrf
        FROM ranked
        ORDER BY rrf DESC
        LIMIT 5
        "#,
    )
    .bind(channel_id)
    .bind(query_text)
    .bind(query_vec)
    .bind(bot_user_id)
    .bind(since)
    .fetch_all(exec)
    .await
}

#[cfg(test)]
mod tests {
    // RRF determinism is exercised end to end against a seeded fake
    // embedder in `tests/search_rrf.rs`, which needs a live Postgres +
    // pgvector instance; no pure-Rust unit test is meaningful here since
    // the ranking happens entirely in SQL.
}
