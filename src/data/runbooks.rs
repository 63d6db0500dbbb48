// src/data/runbooks.rs

use sqlx::FromRow;

use crate::db::Db;

#[derive(Debug, Clone, FromRow)]
pub struct Runbook {
    pub service: String,
    pub alert: String,
    pub content: String,
    pub provenance: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Created or replaced wholesale — runbooks have no merge semantics, the
/// generation worker always writes the full current text.
pub async fn upsert<'c>(
    exec: impl Db<'c>,
    service: &str,
    alert: &str,
    content: &str,
    provenance: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO runbooks (service, alert, content, provenance)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (service, alert) DO UPDATE SET
            content = excluded.content,
            provenance = excluded.provenance,
            updated_at = now()
        "#,
    )
    .bind(service)
    .bind(alert)
    .bind(content)
    .bind(provenance)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn get<'c>(exec: impl Db<'c>, service: &str, alert: &str) -> sqlx::Result<Option<Runbook>> {
    sqlx::query_as::<_, Runbook>(
        "SELECT service, alert, content, provenance, updated_at FROM runbooks WHERE service = $1 AND alert = $2",
    )
    .bind(service)
    .bind(alert)
    .fetch_optional(exec)
    .await
}
