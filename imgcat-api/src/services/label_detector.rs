//! Label detector adapters
//!
//! The classifier is an external HTTP service. It receives a reference to
//! the stored object (key and public URL) and answers with candidate
//! labels and confidences on a 0-100 scale.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::{LabelDetector, StoredObject};
use crate::error::{ApiError, ApiResult};
use crate::models::DetectedLabel;
use imgcat_common::{Error, Result};

pub const INVALID_FORMAT_MESSAGE: &str = "Invalid Image Format (Only .jpg and .png are allowed)";
const DETECTION_ERROR: &str = "Image Recognition Error";

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    key: &'a str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    labels: Vec<DetectedLabel>,
}

/// HTTP classifier client
pub struct HttpLabelDetector {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpLabelDetector {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Self::with_client(client, endpoint, api_key)
    }

    /// Same as [`HttpLabelDetector::new`] with a caller-supplied client
    pub fn with_client(client: reqwest::Client, endpoint: &str, api_key: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            Error::Config(format!("Invalid detector.endpoint '{}': {}", endpoint, e))
        })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl LabelDetector for HttpLabelDetector {
    async fn detect(&self, object: &StoredObject) -> ApiResult<Vec<DetectedLabel>> {
        debug!(key = %object.key, endpoint = %self.endpoint, "Requesting label detection");

        let mut request = self.client.post(self.endpoint.clone()).json(&DetectRequest {
            key: &object.key,
            url: &object.url,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(key = %object.key, error = %e, timed_out = e.is_timeout(), "Label detection request failed");
            ApiError::Detection(DETECTION_ERROR.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::UNSUPPORTED_MEDIA_TYPE || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ApiError::InvalidFormat(INVALID_FORMAT_MESSAGE.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(key = %object.key, status = status.as_u16(), body = %body, "Label detector returned error");
            return Err(ApiError::Detection(DETECTION_ERROR.to_string()));
        }

        let parsed: DetectResponse = response.json().await.map_err(|e| {
            error!(key = %object.key, error = %e, "Unparseable label detector response");
            ApiError::Detection(DETECTION_ERROR.to_string())
        })?;

        debug!(key = %object.key, candidates = parsed.labels.len(), "Label detection complete");

        Ok(parsed.labels)
    }
}

/// Stand-in used when no detector endpoint is configured
#[derive(Debug, Default)]
pub struct DisabledLabelDetector;

#[async_trait]
impl LabelDetector for DisabledLabelDetector {
    async fn detect(&self, _object: &StoredObject) -> ApiResult<Vec<DetectedLabel>> {
        Err(ApiError::Detection(
            "label detection is not configured".to_string(),
        ))
    }
}
