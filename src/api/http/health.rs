// src/api/http/health.rs
//
// Health and metrics endpoints.

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    db: bool,
    vector: bool,
}

/// GET /health
///
/// Always 200; `status` flips to "degraded" when a configured dependency
/// stops answering. Unconfigured backends (mock mode) report false without
/// degrading.
pub async fn health_check(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = match &app.sqlite_pool {
        Some(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.is_ok(),
        None => false,
    };
    let vector_ok = match &app.qdrant {
        Some(store) => store.health_check().await,
        None => false,
    };

    let degraded = (app.sqlite_pool.is_some() && !db_ok) || (app.qdrant.is_some() && !vector_ok);

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" },
        service: "mnemos",
        version: env!("CARGO_PKG_VERSION"),
        db: db_ok,
        vector: vector_ok,
    })
}

/// GET /metrics, Prometheus text format.
pub async fn metrics_handler(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    app.prometheus.render()
}
