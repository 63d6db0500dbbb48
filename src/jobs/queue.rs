// src/jobs/queue.rs
//
// Enqueue and claim operations over the `jobs` table. These are the
// primitives the runtime and every job handler build on; unlike the rest of
// the data layer they live under `jobs` rather than `data` because they're
// part of the substrate's own bookkeeping, not domain state.

use crate::db::Db;

use super::types::{JobRow, NewJob};

/// Inserts one job. Returns the row id. When `opts.unique_key` is set and a
/// pending job with the same (kind, queue, unique_key) already exists, that
/// job's id is returned instead and no new row is inserted — this is the
/// "unique-by-args" contract.
pub async fn enqueue<'c>(exec: impl Db<'c>, job: NewJob) -> sqlx::Result<i64> {
    let scheduled_at = job.opts.scheduled_at.unwrap_or_else(chrono::Utc::now);
    let state = if job.opts.scheduled_at.is_some() {
        "scheduled"
    } else {
        "available"
    };

    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO jobs (kind, queue, args, state, priority, max_attempts, scheduled_at, unique_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (kind, queue, unique_key) WHERE unique_key IS NOT NULL
            AND state IN ('available', 'scheduled', 'running')
        DO UPDATE SET kind = jobs.kind
        RETURNING id
        "#,
    )
    .bind(&job.kind)
    .bind(&job.opts.queue)
    .bind(&job.args)
    .bind(state)
    .bind(job.opts.priority)
    .bind(job.opts.max_attempts)
    .bind(scheduled_at)
    .bind(&job.opts.unique_key)
    .fetch_one(exec)
    .await?;

    Ok(row.0)
}

/// Batch form of [`enqueue`] with identical per-job semantics. Run inside a
/// caller's transaction, all inserted rows become visible atomically on
/// commit.
pub async fn enqueue_many(tx: &mut sqlx::PgConnection, jobs: Vec<NewJob>) -> sqlx::Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(jobs.len());
    for job in jobs {
        ids.push(enqueue(&mut *tx, job).await?);
    }
    Ok(ids)
}

/// Claims up to `limit` available jobs from `queue`, moving them to
/// `running` and returning the claimed rows. Race-free across processes via
/// `FOR UPDATE SKIP LOCKED`: two workers racing on the same queue never
/// claim the same row.
pub async fn claim(pool: &crate::db::Pool, queue: &str, limit: i64) -> sqlx::Result<Vec<JobRow>> {
    sqlx::query_as::<_, JobRow>(
        r#"
        WITH claimed AS (
            SELECT id
            FROM jobs
            WHERE queue = $1
              AND (state = 'available' OR (state = 'scheduled' AND scheduled_at <= now()))
            ORDER BY priority DESC, scheduled_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT $2
        )
        UPDATE jobs
        SET state = 'running', attempt = attempt + 1, running_at = now()
        FROM claimed
        WHERE jobs.id = claimed.id
        RETURNING jobs.id, jobs.kind, jobs.queue, jobs.args, jobs.state, jobs.priority,
                  jobs.attempt, jobs.max_attempts, jobs.scheduled_at, jobs.unique_key,
                  jobs.last_error, jobs.inserted_at, jobs.completed_at
        "#,
    )
    .bind(queue)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Marks a job completed as part of the caller's transaction: if `tx` commits
/// the job is done, if it rolls back the row keeps whatever state `claim`
/// left it in (`running`) and is picked up again once [`reap_stale_running`]
/// expires its lease — the emulation needed in the absence of a transaction
/// type that can carry arbitrary side effects with it.
pub async fn complete_in_tx(tx: &mut sqlx::PgConnection, job_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE jobs SET state = 'completed', completed_at = now() WHERE id = $1")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;
    Ok(())
}

/// Transitions a job back to `available` after `delay`, for the next retry
/// attempt, or to `discarded` once `max_attempts` is exhausted.
pub async fn mark_retryable(pool: &crate::db::Pool, job_id: i64, delay: std::time::Duration, error: &str) -> sqlx::Result<()> {
    let next_at = chrono::Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
    sqlx::query(
        r#"
        UPDATE jobs
        SET state = CASE WHEN attempt >= max_attempts THEN 'discarded' ELSE 'available' END,
            scheduled_at = $2,
            last_error = $3
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(next_at)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_discarded(pool: &crate::db::Pool, job_id: i64, error: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE jobs SET state = 'discarded', last_error = $2 WHERE id = $1")
        .bind(job_id)
        .bind(error)
        .execute(pool)
        .await?;
    Ok(())
}

/// Recovers jobs whose worker died mid-run: a `running` row whose
/// `running_at` is older than `lease` is reset to `available` so another
/// worker picks it up. Per-kind timeouts (`jobs::runtime`) catch a handler
/// that simply runs too long; this catches the case the timeout future
/// itself never gets to run because the process holding it is gone.
/// Returns the number of rows recovered.
pub async fn reap_stale_running(pool: &crate::db::Pool, lease: std::time::Duration) -> sqlx::Result<u64> {
    let cutoff = chrono::Utc::now() - chrono::Duration::from_std(lease).unwrap_or_default();
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET state = 'available', running_at = NULL
        WHERE state = 'running' AND running_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
