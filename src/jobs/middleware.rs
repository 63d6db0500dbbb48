// src/jobs/middleware.rs
//
// A worker call passes through a small chain of middlewares before reaching
// the kind's handler. Each middleware wraps `next` the way tower's
// `Service` layers do, but kept as plain async closures since the chain is
// fixed at startup and never needs dynamic composition.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use tracing::{error, info_span, Instrument};

use crate::error::CoreError;
use crate::jobs::types::JobRow;

pub type HandlerResult = Result<(), CoreError>;

/// Runs `handler` for `job` wrapped in a tracing span and panic guard. A
/// panicking handler is caught and turned into a `Permanent` error rather
/// than taking down the worker task.
pub async fn run_with_middleware<F, Fut>(job: &JobRow, handler: F) -> HandlerResult
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = HandlerResult>,
{
    let span = info_span!(
        "job",
        job_id = job.id,
        kind = %job.kind,
        queue = %job.queue,
        attempt = job.attempt,
    );

    let started = Instant::now();
    let result = async {
        let fut = AssertUnwindSafe(handler()).catch_unwind();
        match fut.await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic);
                error!(panic = %message, "job handler panicked");
                Err(CoreError::permanent(format!("panic: {message}")))
            }
        }
    }
    .instrument(span.clone())
    .await;

    let elapsed = started.elapsed();
    match &result {
        Ok(()) => {
            crate::metrics::record_job_duration(&job.kind, elapsed, true);
        }
        Err(err) => {
            crate::metrics::record_job_duration(&job.kind, elapsed, false);
            span.in_scope(|| error!(error = %err, "job failed"));
        }
    }

    result
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
