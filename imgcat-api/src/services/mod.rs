//! Catalog services
//!
//! - Collaborator seams: [`ObjectStore`], [`LabelDetector`], [`RemoteFetcher`]
//! - [`IngestionOrchestrator`]: image request → stored object + label set + rows
//! - [`RetrievalEngine`]: by id, all, and by label set
//!
//! Collaborators are injected as `Arc<dyn _>` so tests can substitute fakes.

pub mod ingest;
pub mod label_detector;
pub mod object_store;
pub mod remote_fetcher;
pub mod retrieval;

pub use ingest::{IngestTimeouts, IngestionOrchestrator};
pub use label_detector::{DisabledLabelDetector, HttpLabelDetector};
pub use object_store::{FileSystemObjectStore, HttpObjectStore};
pub use remote_fetcher::HttpRemoteFetcher;
pub use retrieval::RetrievalEngine;

use async_trait::async_trait;
use reqwest::Url;
use std::path::Path;
use tempfile::TempPath;

use crate::error::ApiResult;
use crate::models::DetectedLabel;

/// Reference to an object written by an [`ObjectStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Object storage keyed by file name
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Public URL for `key`; depends only on the key and store configuration
    fn public_url(&self, key: &str) -> String;

    /// Upload the file at `local_path` under `key`
    ///
    /// Fails with `ApiError::Storage` on any transport or auth failure.
    async fn put(&self, local_path: &Path, key: &str) -> ApiResult<StoredObject>;
}

/// External label classifier
#[async_trait]
pub trait LabelDetector: Send + Sync {
    /// Candidate labels for a stored object
    ///
    /// Fails with `ApiError::InvalidFormat` when the object is not a supported
    /// image encoding, `ApiError::Detection` otherwise.
    async fn detect(&self, object: &StoredObject) -> ApiResult<Vec<DetectedLabel>>;
}

/// Downloads remote images to local temp files
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Download `url`; the returned temp file is deleted when dropped
    ///
    /// Fails with `ApiError::Fetch` on network failure or non-2xx response.
    async fn fetch(&self, url: &Url) -> ApiResult<TempPath>;
}
