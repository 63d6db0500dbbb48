// src/http/mod.rs
//
// The admin HTTP surface: out of scope as an external contract, but the
// health/readiness endpoints every deployed service needs are still part of
// the ambient stack.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::db::Pool;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
}

pub fn router(pool: Pool) -> Router {
    let state = Arc::new(AppState { pool });

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(5)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn readyz(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (axum::http::StatusCode::OK, Json(json!({"status": "ready"}))),
        Err(err) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "not ready", "error": err.to_string()})),
        ),
    }
}
