//! Test Helper Utilities
//!
//! Shared setup for imgcat-api integration tests

#![allow(dead_code)]

pub mod fakes;

pub use fakes::{
    Detection, FakeLabelDetector, FakeObjectStore, FakeRemoteFetcher, OBJECT_BASE_URL,
};

use imgcat_api::models::{ImageSource, IngestRequest};
use imgcat_api::services::{IngestTimeouts, IngestionOrchestrator, RetrievalEngine};
use imgcat_api::AppState;
use sqlx::SqlitePool;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{NamedTempFile, TempPath};

/// Fresh in-memory catalog plus fakes for every collaborator
pub struct Harness {
    pub pool: SqlitePool,
    pub store: Arc<FakeObjectStore>,
    pub detector: Arc<FakeLabelDetector>,
    pub fetcher: Arc<FakeRemoteFetcher>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(FakeObjectStore::default(), FakeRemoteFetcher::default()).await
    }

    pub async fn with(store: FakeObjectStore, fetcher: FakeRemoteFetcher) -> Self {
        let pool = imgcat_common::db::init_in_memory()
            .await
            .expect("in-memory database");

        Self {
            pool,
            store: Arc::new(store),
            detector: Arc::new(FakeLabelDetector::default()),
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn orchestrator(&self) -> IngestionOrchestrator {
        IngestionOrchestrator::new(
            self.pool.clone(),
            self.store.clone(),
            self.detector.clone(),
            self.fetcher.clone(),
        )
        .with_timeouts(IngestTimeouts {
            fetch: Duration::from_secs(5),
            detect: Duration::from_millis(200),
        })
    }

    pub fn retrieval(&self) -> RetrievalEngine {
        RetrievalEngine::new(self.pool.clone())
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.orchestrator(), self.retrieval())
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

/// Request for a remote image
pub fn url_request(url: &str, label: Option<&str>, analyze: bool) -> IngestRequest {
    IngestRequest {
        source: ImageSource::Url(url.parse().unwrap()),
        label: label.map(str::to_string),
        analyze,
    }
}

/// Spool `bytes` to a temp file and build an upload request for it
///
/// Keep the returned path alive until ingestion finishes.
pub fn upload_request(
    original_name: &str,
    bytes: &[u8],
    label: Option<&str>,
    analyze: bool,
) -> (IngestRequest, TempPath) {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    let path = file.into_temp_path();

    let request = IngestRequest {
        source: ImageSource::Upload {
            local_path: path.to_path_buf(),
            original_name: original_name.to_string(),
        },
        label: label.map(str::to_string),
        analyze,
    };

    (request, path)
}
