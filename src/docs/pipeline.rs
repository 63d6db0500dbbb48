// src/docs/pipeline.rs
// Per-source documentation refresh job.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::data::docs as data;
use crate::db::Pool;
use crate::error::{CoreError, CoreResult};
use crate::jobs::{periodic::PeriodicSource, EnqueueOptions, NewJob};
use crate::llm::Embedder;

use super::chunker::{self, Chunk};
use super::source::{DocumentationSource, Update};

pub const KIND: &str = "refresh_documentation_source";
const MAX_CONCURRENT_UPDATES: usize = 8;

/// Every configured source gets its own hourly slot; no timeout on the job
/// itself (its own bounded parallelism above contains cost), so this only
/// bounds how stale a source is allowed to get between refreshes.
pub const CRON: &str = "0 * * * *";

#[derive(Debug, Serialize, Deserialize)]
pub struct Args {
    pub source: String,
}

/// One job per configured source name, `unique_by_args` so a slow refresh
/// is never joined by a second overlapping one at the next fire.
pub fn periodic_source(source_names: Vec<String>) -> anyhow::Result<PeriodicSource> {
    PeriodicSource::new(KIND, CRON, move || {
        let source_names = source_names.clone();
        async move {
            source_names
                .into_iter()
                .map(|name| {
                    Ok(NewJob::new(KIND, Args { source: name.clone() })?
                        .with_opts(EnqueueOptions::default().unique_by_args(name)))
                })
                .collect()
        }
    })
}

pub async fn run(pool: Pool, source: Arc<dyn DocumentationSource>, embedder: Arc<dyn Embedder>) -> CoreResult<()> {
    let url = source.url().to_string();
    let current = data::get_or_insert_source(&pool, &url).await.map_err(CoreError::from)?;

    let changes = source.changes_since(&current.current_revision).await?;
    let total = changes.updates.len();

    let results: Vec<anyhow::Result<()>> = stream::iter(changes.updates)
        .map(|update| {
            let pool = pool.clone();
            let source = source.clone();
            let embedder = embedder.clone();
            let url = url.clone();
            async move { process_update(&pool, &*source, &*embedder, &url, update).await }
        })
        .buffer_unordered(MAX_CONCURRENT_UPDATES)
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    for err in results.into_iter().filter_map(Result::err) {
        warn!(source = %url, error = %err, "documentation update failed, skipping");
    }
    info!(source = %url, total, failed, "documentation source drained");

    // The deferred error is inspected only after the sequence is fully
    // drained — a per-source `ChangesSince` failure fails the whole job
    // even though individual update failures above did not.
    if let Some(err) = changes.error {
        return Err(CoreError::transient(format!("changes_since failed: {err}")));
    }

    data::update_source_revision(&pool, &url, &changes.head_revision)
        .await
        .map_err(CoreError::from)?;

    Ok(())
}

async fn process_update(
    pool: &Pool,
    source: &dyn DocumentationSource,
    embedder: &dyn Embedder,
    url: &str,
    update: Update,
) -> anyhow::Result<()> {
    if data::update_document_revision_if_sha_matches(pool, url, &update.path, &update.blob_sha, &update.revision)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let content = source.get(&update.path, &update.revision).await?;
    let blob_sha = update.blob_sha.clone();

    let chunks = chunk_document(&update.path, &content);
    let mut embedded = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.into_iter().enumerate() {
        if chunk.text.trim().is_empty() {
            continue;
        }
        let vector = embedder.embed(&chunk.text).await?;
        embedded.push((index as i32, chunk.text, Vector::from(vector)));
    }

    let mut tx = pool.begin().await?;
    data::insert_doc_with_embeddings(&mut *tx, url, &update.path, &update.revision, &blob_sha, &content, &embedded).await?;
    tx.commit().await?;

    crate::metrics::record_embeddings_generated(url, embedded.len() as u64);
    Ok(())
}

/// Markdown files get front-matter stripped and a Markdown-aware body
/// splitter; everything else gets the recursive character splitter.
/// Non-empty front-matter becomes a synthetic chunk at index 0, shifting
/// the rest by one.
fn chunk_document(path: &str, content: &str) -> Vec<Chunk> {
    let is_markdown = path.ends_with(".md") || path.ends_with(".markdown");

    let (front_matter, body_chunks) = if is_markdown {
        let fm = chunker::strip_front_matter(content);
        let chunks = chunker::chunk_markdown(&fm.body);
        (fm.fields, chunks)
    } else {
        (Default::default(), chunker::chunk_plain(content))
    };

    if front_matter.is_empty() {
        return body_chunks;
    }

    let metadata_text = format!("Metadata: {front_matter:?}");
    std::iter::once(Chunk { text: metadata_text }).chain(body_chunks).collect()
}

/// Stable content hash used when a source's own blob sha isn't available
/// (some source kinds identify content only by path+revision); not used by
/// the GitHub adapter, which carries a real blob sha from the compare API,
/// but kept as a fallback for future source kinds.
#[allow(dead_code)]
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_with_front_matter_gets_synthetic_chunk_at_zero() {
        let content = "---\ntitle: Foo\n---\n# Heading\nbody text";
        let chunks = chunk_document("doc.md", content);
        assert!(chunks[0].text.starts_with("Metadata:"));
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn plain_file_has_no_synthetic_chunk() {
        let chunks = chunk_document("notes.txt", "just plain text");
        assert!(!chunks[0].text.starts_with("Metadata:"));
    }
}
