// src/data/docs.rs

use pgvector::Vector;
use sqlx::FromRow;

use crate::db::Db;

#[derive(Debug, Clone, FromRow)]
pub struct DocumentationSource {
    pub url: String,
    #[sqlx(rename = "revision")]
    pub current_revision: String,
    pub last_refreshed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub url: String,
    pub path: String,
    pub revision: String,
    pub blob_sha: String,
    pub content: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ClosestDoc {
    pub url: String,
    pub path: String,
    pub revision: String,
    pub content: String,
}

/// Insert-if-absent; returns the current record either way.
pub async fn get_or_insert_source<'c>(exec: impl Db<'c>, url: &str) -> sqlx::Result<DocumentationSource> {
    sqlx::query_as::<_, DocumentationSource>(
        r#"
        INSERT INTO documentation_sources (url, revision)
        VALUES ($1, '')
        ON CONFLICT (url) DO UPDATE SET url = documentation_sources.url
        RETURNING url, revision, last_refreshed_at
        "#,
    )
    .bind(url)
    .fetch_one(exec)
    .await
}

pub async fn update_source_revision<'c>(exec: impl Db<'c>, url: &str, new_revision: &str) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE documentation_sources SET revision = $2, last_refreshed_at = now() WHERE url = $1",
    )
    .bind(url)
    .bind(new_revision)
    .execute(exec)
    .await?;
    Ok(())
}

/// Cheap short-circuit for unchanged blobs: if a row exists for (url, path)
/// with this blob_sha, advance its revision and report success without
/// touching embeddings. Returns `None` ("no rows") when the blob_sha doesn't
/// match — the caller must then fetch content and re-embed.
pub async fn update_document_revision_if_sha_matches<'c>(
    exec: impl Db<'c>,
    url: &str,
    path: &str,
    blob_sha: &str,
    new_revision: &str,
) -> sqlx::Result<Option<DocumentRow>> {
    sqlx::query_as::<_, DocumentRow>(
        r#"
        UPDATE documentation_docs
        SET revision = $4
        WHERE url = $1 AND path = $2 AND blob_sha = $3
        RETURNING url, path, revision, blob_sha, content
        "#,
    )
    .bind(url)
    .bind(path)
    .bind(blob_sha)
    .bind(new_revision)
    .fetch_optional(exec)
    .await
}

/// Atomically: no-ops if (url, path, revision) already present; otherwise
/// drops stale embeddings for (url, path), upserts the document, and inserts
/// the new chunk set. Must run inside a transaction — callers pass `&mut
/// *tx` so all four effects commit together.
pub async fn insert_doc_with_embeddings(
    tx: &mut sqlx::PgConnection,
    url: &str,
    path: &str,
    revision: &str,
    blob_sha: &str,
    content: &str,
    chunks: &[(i32, String, Vector)],
) -> sqlx::Result<()> {
    let exists: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM documentation_docs WHERE url = $1 AND path = $2 AND revision = $3",
    )
    .bind(url)
    .bind(path)
    .bind(revision)
    .fetch_optional(&mut *tx)
    .await?;
    if exists.is_some() {
        return Ok(());
    }

    sqlx::query("DELETE FROM documentation_embeddings WHERE url = $1 AND path = $2 AND blob_sha <> $3")
        .bind(url)
        .bind(path)
        .bind(blob_sha)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO documentation_docs (url, path, revision, blob_sha, content)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (url, path) DO UPDATE SET
            revision = excluded.revision,
            blob_sha = excluded.blob_sha,
            content = excluded.content
        "#,
    )
    .bind(url)
    .bind(path)
    .bind(revision)
    .bind(blob_sha)
    .bind(content)
    .execute(&mut *tx)
    .await?;

    for (index, chunk_text, embedding) in chunks {
        sqlx::query(
            r#"
            INSERT INTO documentation_embeddings (url, path, blob_sha, chunk_index, chunk_text, embedding)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (url, path, blob_sha, chunk_index) DO UPDATE SET
                chunk_text = excluded.chunk_text,
                embedding = excluded.embedding
            "#,
        )
        .bind(url)
        .bind(path)
        .bind(blob_sha)
        .bind(index)
        .bind(chunk_text)
        .bind(embedding)
        .execute(&mut *tx)
        .await?;
    }

    Ok(())
}

/// Up to `k` documents ordered by per-document nearest-chunk vector
/// distance ascending, one row per (url, path).
pub async fn get_closest_docs<'c>(exec: impl Db<'c>, query_vec: &Vector, k: i64) -> sqlx::Result<Vec<ClosestDoc>> {
    sqlx::query_as::<_, ClosestDoc>(
        r#"
        SELECT d.url, d.path, d.revision, d.content
        FROM documentation_docs d
        JOIN LATERAL (
            SELECT e.embedding <-> $1 AS dist
            FROM documentation_embeddings e
            WHERE e.url = d.url AND e.path = d.path AND e.blob_sha = d.blob_sha
            ORDER BY e.embedding <-> $1
            LIMIT 1
        ) nearest ON true
        ORDER BY nearest.dist ASC
        LIMIT $2
        "#,
    )
    .bind(query_vec)
    .bind(k)
    .fetch_all(exec)
    .await
}

/// Top 25 nearest chunks grouped by (url, path, blob_sha); returns the
/// document belonging to the group with the highest chunk count
/// ("document to update"). Ties broken by descending count then arbitrary
/// row order, matching `ORDER BY count DESC LIMIT 1` with no secondary key.
pub async fn get_document_to_update<'c>(exec: impl Db<'c>, query_vec: &Vector) -> sqlx::Result<Option<DocumentRow>> {
    sqlx::query_as::<_, DocumentRow>(
        r#"
        WITH nearest_chunks AS (
            SELECT url, path, blob_sha
            FROM documentation_embeddings
            ORDER BY embedding <-> $1
            LIMIT 25
        ),
        grouped AS (
            SELECT url, path, blob_sha, count(*) AS chunk_count
            FROM nearest_chunks
            GROUP BY url, path, blob_sha
            ORDER BY chunk_count DESC
            LIMIT 1
        )
        SELECT d.url, d.path, d.revision, d.content
        FROM documentation_docs d
        JOIN grouped g ON g.url = d.url AND g.path = d.path AND g.blob_sha = d.blob_sha
        "#,
    )
    .bind(query_vec)
    .fetch_optional(exec)
    .await
}
