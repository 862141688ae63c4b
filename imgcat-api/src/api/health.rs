//! Health check endpoint
//!
//! Probes the catalog database on every call. An unreachable database
//! reports `degraded` (still HTTP 200) so monitors can tell it apart from
//! a dead process.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Commit the binary was built from
    pub build: &'static str,
    pub uptime_seconds: u64,
    /// Object store backend in use
    pub object_store: &'static str,
    /// Stored image count; absent when the database could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<i64>,
    /// Most recent ingestion failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;

    let images = match state.retrieval.count().await {
        Ok(count) => Some(count),
        Err(err) => {
            warn!(error = %err, "Health probe could not read the catalog");
            None
        }
    };

    Json(HealthResponse {
        status: if images.is_some() { "ok" } else { "degraded" },
        module: "imgcat-api",
        version: env!("CARGO_PKG_VERSION"),
        build: env!("GIT_HASH"),
        uptime_seconds,
        object_store: state.ingestion.store_backend(),
        images,
        last_error: state.last_error.read().await.clone(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
