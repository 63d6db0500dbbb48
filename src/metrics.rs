// src/metrics.rs
//
// Prometheus gauges/counters/histograms: one recording function per
// concern, called from the place that already has the relevant
// duration/count in hand rather than threaded through as a shared struct.

use std::time::Duration;

use metrics::{counter, histogram};

pub fn install_recorder(addr: std::net::SocketAddr) -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}

pub fn record_job_duration(kind: &str, elapsed: Duration, ok: bool) {
    let kind = kind.to_string();
    histogram!("ratchet_job_duration_seconds", "kind" => kind.clone()).record(elapsed.as_secs_f64());
    let outcome = if ok { "ok" } else { "error" };
    counter!("ratchet_jobs_total", "kind" => kind, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_module_dispatch(module: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("ratchet_module_dispatch_total", "module" => module.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_embeddings_generated(source: &str, count: u64) {
    counter!("ratchet_embeddings_generated_total", "source" => source.to_string()).increment(count);
}

pub fn record_llm_call(kind: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("ratchet_llm_calls_total", "kind" => kind.to_string(), "outcome" => outcome.to_string()).increment(1);
}

pub fn record_ingestion_page(channel_id: &str, inserted: u64) {
    counter!("ratchet_ingestion_messages_total", "channel" => channel_id.to_string()).increment(inserted);
}
