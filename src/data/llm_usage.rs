// src/data/llm_usage.rs

use crate::db::Db;

pub async fn record<'c>(
    exec: impl Db<'c>,
    model: &str,
    input_tokens: i64,
    output_tokens: i64,
) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO llm_usage (model, input_tokens, output_tokens) VALUES ($1, $2, $3)")
        .bind(model)
        .bind(input_tokens)
        .bind(output_tokens)
        .execute(exec)
        .await?;
    Ok(())
}

/// Deletes usage rows older than `cutoff`; returns the count removed so the
/// periodic purge job can report it on its tracing span.
pub async fn purge_older_than<'c>(exec: impl Db<'c>, cutoff: chrono::DateTime<chrono::Utc>) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM llm_usage WHERE created_at < $1")
        .bind(cutoff)
        .execute(exec)
        .await?;
    Ok(result.rows_affected())
}
