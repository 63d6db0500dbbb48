// tests/data_layer.rs
//
// Exercises the data layer against a real Postgres instance. Each test gets
// its own migrated database via `sqlx::test` (the Postgres-idiomatic
// equivalent of an in-memory fixture pool), so these run against `DATABASE_URL`
// in CI rather than in isolation.

use ratchet::data::{channels, docs, messages, runbooks};
use ratchet::jobs::{queue, EnqueueOptions, JobState, NewJob};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test]
async fn add_message_is_idempotent_on_conflict(pool: PgPool) -> sqlx::Result<()> {
    channels::get_or_create(&pool, "C1").await?;

    let first = messages::add_message(&pool, "C1", "100.000001", &json!({"text": "hello"})).await?;
    let second = messages::add_message(&pool, "C1", "100.000001", &json!({"text": "different"})).await?;

    assert!(first);
    assert!(!second);

    let stored = messages::get(&pool, "C1", "100.000001").await?.unwrap();
    assert_eq!(stored.attrs["text"], "hello");
    Ok(())
}

#[sqlx::test]
async fn reaction_counts_never_go_negative(pool: PgPool) -> sqlx::Result<()> {
    channels::get_or_create(&pool, "C1").await?;
    messages::add_message(&pool, "C1", "100.000001", &json!({})).await?;

    messages::update_reaction(&pool, "C1", "100.000001", "thumbsup", 1).await?;
    messages::update_reaction(&pool, "C1", "100.000001", "thumbsup", 1).await?;
    let msg = messages::get(&pool, "C1", "100.000001").await?.unwrap();
    assert_eq!(msg.attrs["reactions"]["thumbsup"], 2);

    messages::update_reaction(&pool, "C1", "100.000001", "thumbsup", -5).await?;
    let msg = messages::get(&pool, "C1", "100.000001").await?.unwrap();
    assert!(msg.attrs.get("reactions").map(|r| r.get("thumbsup").is_none()).unwrap_or(true));
    Ok(())
}

#[sqlx::test]
async fn watermark_advance_is_visible_after_set(pool: PgPool) -> sqlx::Result<()> {
    let channel = channels::get_or_create(&pool, "C1").await?;
    assert_eq!(channel.watermark, "0.000000");

    channels::set_watermark(&pool, "C1", "200.500000").await?;
    let channel = channels::get(&pool, "C1").await?.unwrap();
    assert_eq!(channel.watermark, "200.500000");
    Ok(())
}

#[sqlx::test]
async fn insert_doc_with_embeddings_skips_when_revision_already_current(pool: PgPool) -> sqlx::Result<()> {
    docs::get_or_insert_source(&pool, "https://github.com/acme/docs").await?;

    let chunks = vec![(0, "first chunk".to_string(), pgvector::Vector::from(vec![0.0; 768]))];

    let mut tx = pool.begin().await?;
    docs::insert_doc_with_embeddings(&mut tx, "https://github.com/acme/docs", "runbooks/a.md", "rev1", "sha1", "first chunk", &chunks).await?;
    tx.commit().await?;

    // Re-inserting at the same (url, path, revision) is a no-op: it must not
    // duplicate or error, since a re-run of a refresh job can race a prior one.
    let mut tx = pool.begin().await?;
    docs::insert_doc_with_embeddings(&mut tx, "https://github.com/acme/docs", "runbooks/a.md", "rev1", "sha1", "first chunk", &chunks).await?;
    tx.commit().await?;

    let closest = docs::get_closest_docs(&pool, &pgvector::Vector::from(vec![0.0; 768]), 5).await?;
    assert_eq!(closest.len(), 1);
    Ok(())
}

#[sqlx::test]
async fn runbook_upsert_replaces_content_for_same_service_and_alert(pool: PgPool) -> sqlx::Result<()> {
    runbooks::upsert(&pool, "checkout", "high-latency", "v1 steps", "incident-closer").await?;
    runbooks::upsert(&pool, "checkout", "high-latency", "v2 steps", "incident-closer").await?;

    let runbook = runbooks::get(&pool, "checkout", "high-latency").await?.unwrap();
    assert_eq!(runbook.content, "v2 steps");
    Ok(())
}

#[sqlx::test]
async fn enqueue_with_unique_key_dedups_pending_jobs(pool: PgPool) -> sqlx::Result<()> {
    let opts = EnqueueOptions::default().unique_by_args("C1");
    let job_a = NewJob::new("ingest_channel", json!({"channel": "C1"})).unwrap().with_opts(opts.clone());
    let job_b = NewJob::new("ingest_channel", json!({"channel": "C1"})).unwrap().with_opts(opts);

    let id_a = queue::enqueue(&pool, job_a).await?;
    let id_b = queue::enqueue(&pool, job_b).await?;

    assert_eq!(id_a, id_b);
    Ok(())
}

#[sqlx::test]
async fn claim_marks_jobs_running_and_skips_already_claimed(pool: PgPool) -> sqlx::Result<()> {
    let job = NewJob::new("ingest_channel", json!({"channel": "C1"})).unwrap();
    queue::enqueue(&pool, job).await?;

    let claimed = queue::claim(&pool, "default", 10).await?;
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].state(), JobState::Running);

    // A second claim on the same queue finds nothing left to take.
    let claimed_again = queue::claim(&pool, "default", 10).await?;
    assert!(claimed_again.is_empty());
    Ok(())
}

#[sqlx::test]
async fn complete_in_tx_only_persists_on_commit(pool: PgPool) -> sqlx::Result<()> {
    let job = NewJob::new("ingest_channel", json!({"channel": "C1"})).unwrap();
    let job_id = queue::enqueue(&pool, job).await?;
    queue::claim(&pool, "default", 10).await?;

    let mut tx = pool.begin().await?;
    queue::complete_in_tx(&mut tx, job_id).await?;
    tx.rollback().await?;

    let state: String = sqlx::query_scalar("SELECT state FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(state, "running", "rolled-back completion must not persist");

    let mut tx = pool.begin().await?;
    queue::complete_in_tx(&mut tx, job_id).await?;
    tx.commit().await?;

    let state: String = sqlx::query_scalar("SELECT state FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(state, "completed");
    Ok(())
}
