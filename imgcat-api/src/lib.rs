//! imgcat-api library interface
//!
//! Image catalog service: ingestion (upload or remote URL → object store →
//! optional label detection → SQLite rows) and retrieval (by id, all, or by
//! label set). Exposed as a library for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::{IngestionOrchestrator, RetrievalEngine};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionOrchestrator>,
    pub retrieval: RetrievalEngine,
    /// Directory served at `/objects` (filesystem object store only)
    pub objects_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last ingestion failure, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(ingestion: IngestionOrchestrator, retrieval: RetrievalEngine) -> Self {
        Self {
            ingestion: Arc::new(ingestion),
            retrieval,
            objects_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_objects_dir(mut self, objects_dir: Option<PathBuf>) -> Self {
        self.objects_dir = objects_dir;
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub(crate) async fn record_error(&self, err: &ApiError) {
        *self.last_error.write().await = Some(err.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(api::image_routes())
        .merge(api::health_routes());

    if let Some(dir) = &state.objects_dir {
        router = router.nest_service("/objects", ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
