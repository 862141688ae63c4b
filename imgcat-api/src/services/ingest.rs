//! Ingestion orchestrator
//!
//! Turns one validated [`IngestRequest`] into a stored object, an `image`
//! row and (optionally) a persisted label set:
//!
//! 1. Acquire bytes: download the URL, or use the spooled upload
//! 2. Resolve the label (defaults to the file key)
//! 3. Upload the object and insert the image row concurrently
//! 4. If requested, detect labels, keep confident ones, persist
//!    vocabulary rows then association rows
//! 5. Return the composite record
//!
//! No step is retried and no write is compensated. When exactly one side
//! of step 3 fails the other side's write stays in place and is logged.

use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{LabelDetector, ObjectStore, RemoteFetcher, StoredObject};
use crate::db::{image_labels, images, labels};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    file_key_from_upload, file_key_from_url, normalize_label, CompositeImageRecord,
    DetectedLabel, IdentifiedObject, ImageSource, IngestRequest, NewImage,
    CONFIDENCE_THRESHOLD, MAX_CONFIDENCE,
};

/// Upper bounds on the slow external calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestTimeouts {
    pub fetch: Duration,
    pub detect: Duration,
}

impl Default for IngestTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(30),
            detect: Duration::from_secs(30),
        }
    }
}

/// Local copy of the incoming image
enum LocalImage {
    /// Deleted when the ingestion finishes
    Downloaded(TempPath),
    /// Owned by the caller
    Uploaded(PathBuf),
}

struct AcquiredImage {
    file_key: String,
    local: LocalImage,
}

impl AcquiredImage {
    fn path(&self) -> &Path {
        match &self.local {
            LocalImage::Downloaded(path) => &**path,
            LocalImage::Uploaded(path) => path.as_path(),
        }
    }
}

pub struct IngestionOrchestrator {
    db: SqlitePool,
    store: Arc<dyn ObjectStore>,
    detector: Arc<dyn LabelDetector>,
    fetcher: Arc<dyn RemoteFetcher>,
    timeouts: IngestTimeouts,
}

impl IngestionOrchestrator {
    pub fn new(
        db: SqlitePool,
        store: Arc<dyn ObjectStore>,
        detector: Arc<dyn LabelDetector>,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> Self {
        Self {
            db,
            store,
            detector,
            fetcher,
            timeouts: IngestTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: IngestTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Name of the configured object store backend
    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Ingest one image
    pub async fn ingest(&self, request: IngestRequest) -> ApiResult<CompositeImageRecord> {
        let acquired = self.acquire(&request.source).await?;
        let file_key = acquired.file_key.clone();

        let new_image = NewImage {
            label: resolve_label(request.label.as_deref(), &file_key),
            url: self.store.public_url(&file_key),
            name: file_key,
        };

        let (stored, image_id) = self.commit(acquired.path(), &new_image).await?;
        let image = new_image.with_id(image_id);

        let objects_identified = if request.analyze {
            self.analyze(image.id, &stored).await?
        } else {
            Vec::new()
        };

        info!(
            image_id = image.id,
            key = %image.name,
            labels = objects_identified.len(),
            analyzed = request.analyze,
            "Image ingested"
        );

        Ok(CompositeImageRecord {
            image,
            objects_identified,
        })
    }

    async fn acquire(&self, source: &ImageSource) -> ApiResult<AcquiredImage> {
        match source {
            ImageSource::Url(url) => {
                let file_key = file_key_from_url(url)?;
                let path = timeout(self.timeouts.fetch, self.fetcher.fetch(url))
                    .await
                    .map_err(|_| {
                        warn!(url = %url, "Image download timed out");
                        ApiError::Fetch(format!("Timed out downloading image from {}", url))
                    })??;

                Ok(AcquiredImage {
                    file_key,
                    local: LocalImage::Downloaded(path),
                })
            }
            ImageSource::Upload {
                local_path,
                original_name,
            } => Ok(AcquiredImage {
                file_key: file_key_from_upload(original_name)?,
                local: LocalImage::Uploaded(local_path.clone()),
            }),
        }
    }

    /// Upload the object and insert the image row at the same time
    ///
    /// Both must succeed. Neither write is undone when the other fails.
    async fn commit(&self, local_path: &Path, image: &NewImage) -> ApiResult<(StoredObject, i64)> {
        debug!(key = %image.name, backend = self.store.backend_name(), "Committing image");

        let (upload, insert) = tokio::join!(
            self.store.put(local_path, &image.name),
            images::insert_image(&self.db, image),
        );

        match (upload, insert) {
            (Ok(stored), Ok(image_id)) => Ok((stored, image_id)),
            (Ok(stored), Err(err)) => {
                warn!(key = %stored.key, "Object stored without an image row (orphaned object)");
                Err(err)
            }
            (Err(err), Ok(image_id)) => {
                warn!(image_id, key = %image.name, "Image row inserted without a stored object");
                Err(err)
            }
            (Err(upload_err), Err(insert_err)) => {
                error!(key = %image.name, error = %insert_err, "Image row insert failed alongside upload");
                Err(upload_err)
            }
        }
    }

    /// Detect, filter and persist labels for a freshly stored image
    async fn analyze(&self, image_id: i64, stored: &StoredObject) -> ApiResult<Vec<IdentifiedObject>> {
        let detected = timeout(self.timeouts.detect, self.detector.detect(stored))
            .await
            .map_err(|_| {
                warn!(image_id, key = %stored.key, "Label detection timed out");
                ApiError::Detection("Image Recognition timed out".to_string())
            })??;

        let candidates = detected.len();
        let objects = select_confident_labels(detected);
        debug!(image_id, candidates, kept = objects.len(), "Filtered detector output");

        if objects.is_empty() {
            return Ok(objects);
        }

        // Vocabulary rows must exist before association rows reference them
        let names: Vec<String> = objects.iter().map(|o| o.label.clone()).collect();
        labels::insert_labels(&self.db, &names).await?;
        let persisted = image_labels::insert_image_labels(&self.db, image_id, &objects).await?;

        Ok(objects
            .into_iter()
            .filter(|o| persisted.iter().any(|p| p.label == o.label))
            .collect())
    }
}

/// Explicit label when non-empty, else the file key
pub fn resolve_label(explicit: Option<&str>, file_key: &str) -> String {
    match explicit {
        Some(label) if !label.trim().is_empty() => label.to_string(),
        _ => file_key.to_string(),
    }
}

/// Keep candidates with `90 < confidence <= 100`, lower-case names, merge duplicates
///
/// Duplicate names keep the highest confidence at the first-seen position.
pub fn select_confident_labels(detected: Vec<DetectedLabel>) -> Vec<IdentifiedObject> {
    let mut selected: Vec<IdentifiedObject> = Vec::with_capacity(detected.len());

    for candidate in detected {
        if !(candidate.confidence > CONFIDENCE_THRESHOLD && candidate.confidence <= MAX_CONFIDENCE) {
            continue;
        }

        let label = normalize_label(&candidate.name);
        if label.is_empty() {
            continue;
        }

        match selected.iter_mut().find(|o| o.label == label) {
            Some(existing) => existing.conf = existing.conf.max(candidate.confidence),
            None => selected.push(IdentifiedObject {
                label,
                conf: candidate.confidence,
            }),
        }
    }

    selected
}
