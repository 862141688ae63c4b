//! Catalog data model
//!
//! Row types for the `image`, `label` and `image_label` tables, the
//! composite record returned by every read, and the validated ingestion
//! request built by the route layer.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ApiError, ApiResult};

/// Detector confidence must be strictly greater than this to be persisted
pub const CONFIDENCE_THRESHOLD: f64 = 90.0;

/// Highest confidence a detector can report
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Persisted image row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: i64,
    pub name: String,
    pub label: String,
    pub url: String,
}

/// Image row before insertion (id is generated by the database)
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub name: String,
    pub label: String,
    pub url: String,
}

impl NewImage {
    pub fn with_id(self, id: i64) -> Image {
        Image {
            id,
            name: self.name,
            label: self.label,
            url: self.url,
        }
    }
}

/// `(label, confidence)` pair attached to an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentifiedObject {
    pub label: String,
    pub conf: f64,
}

/// Image row joined with its associated labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeImageRecord {
    pub image: Image,
    pub objects_identified: Vec<IdentifiedObject>,
}

/// Raw label candidate returned by a label detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLabel {
    pub name: String,
    pub confidence: f64,
}

impl DetectedLabel {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Where the image bytes come from
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Download from a remote `http`/`https` URL
    Url(Url),
    /// Bytes already received and spooled to a local file
    Upload {
        local_path: PathBuf,
        original_name: String,
    },
}

/// Validated ingestion request
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRequest {
    pub source: ImageSource,
    /// Explicit label; absent or empty means "use the file key"
    pub label: Option<String>,
    pub analyze: bool,
}

/// Parse and validate a remote image URL
pub fn parse_source_url(raw: &str) -> ApiResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid url '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ApiError::BadRequest(format!(
                "Unsupported url scheme '{}' (expected http or https)",
                other
            )))
        }
    }

    file_key_from_url(&url)?;
    Ok(url)
}

/// Storage key for a remote image: the URL's final path segment
pub fn file_key_from_url(url: &Url) -> ApiResult<String> {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    validate_file_key(segment).map_err(|_| {
        ApiError::BadRequest(format!("Url has no file name in its path: {}", url))
    })
}

/// Storage key for an upload: the final component of its original file name
pub fn file_key_from_upload(original_name: &str) -> ApiResult<String> {
    // Browsers on some platforms send full client paths
    let name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    validate_file_key(name)
}

fn validate_file_key(key: &str) -> ApiResult<String> {
    let key = key.trim();
    if key.is_empty() || key == "." || key == ".." {
        return Err(ApiError::BadRequest(format!("Invalid file name '{}'", key)));
    }
    Ok(key.to_string())
}

/// Normalize a label name for storage and matching
pub fn normalize_label(name: &str) -> String {
    name.trim().to_lowercase()
}
