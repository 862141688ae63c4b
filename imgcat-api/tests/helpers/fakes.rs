//! In-process collaborator fakes
//!
//! Stand-ins for the object store, label detector and remote fetcher so
//! ingestion can be driven without any network.

use async_trait::async_trait;
use imgcat_api::models::DetectedLabel;
use imgcat_api::services::{LabelDetector, ObjectStore, RemoteFetcher, StoredObject};
use imgcat_api::{ApiError, ApiResult};
use reqwest::Url;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::{NamedTempFile, TempPath};

pub const OBJECT_BASE_URL: &str = "https://objects.test";

/// Records every successful put with the bytes it received
#[derive(Default)]
pub struct FakeObjectStore {
    puts: Mutex<Vec<(String, Vec<u8>)>>,
    fail: bool,
}

impl FakeObjectStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn stored_keys(&self) -> Vec<String> {
        self.puts.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn stored_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, bytes)| bytes.clone())
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    fn backend_name(&self) -> &'static str {
        "fake"
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", OBJECT_BASE_URL, key)
    }

    async fn put(&self, local_path: &Path, key: &str) -> ApiResult<StoredObject> {
        if self.fail {
            return Err(ApiError::Storage("Image Upload Error".to_string()));
        }

        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        self.puts.lock().unwrap().push((key.to_string(), bytes));

        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
        })
    }
}

/// Scripted detector outcome for one object key
#[derive(Debug, Clone)]
pub enum Detection {
    Labels(Vec<DetectedLabel>),
    InvalidFormat,
    Failure,
    /// Never answers within any reasonable timeout
    Hang,
}

/// Answers per object key; unscripted keys get no labels
#[derive(Default)]
pub struct FakeLabelDetector {
    script: Mutex<HashMap<String, Detection>>,
    calls: Mutex<Vec<StoredObject>>,
}

impl FakeLabelDetector {
    pub fn script(&self, key: &str, detection: Detection) {
        self.script.lock().unwrap().insert(key.to_string(), detection);
    }

    pub fn labels(&self, key: &str, labels: &[(&str, f64)]) {
        let labels = labels
            .iter()
            .map(|(name, confidence)| DetectedLabel::new(*name, *confidence))
            .collect();
        self.script(key, Detection::Labels(labels));
    }

    pub fn calls(&self) -> Vec<StoredObject> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LabelDetector for FakeLabelDetector {
    async fn detect(&self, object: &StoredObject) -> ApiResult<Vec<DetectedLabel>> {
        self.calls.lock().unwrap().push(object.clone());
        let detection = self.script.lock().unwrap().get(&object.key).cloned();

        match detection {
            None => Ok(Vec::new()),
            Some(Detection::Labels(labels)) => Ok(labels),
            Some(Detection::InvalidFormat) => Err(ApiError::InvalidFormat(
                "Invalid Image Format (Only .jpg and .png are allowed)".to_string(),
            )),
            Some(Detection::Failure) => {
                Err(ApiError::Detection("Image Recognition Error".to_string()))
            }
            Some(Detection::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Serves the same bytes for every URL
pub struct FakeRemoteFetcher {
    body: Vec<u8>,
    fail: bool,
    hang: bool,
    calls: Mutex<Vec<Url>>,
}

impl Default for FakeRemoteFetcher {
    fn default() -> Self {
        Self {
            body: b"\x89PNG\r\n\x1a\nfake-image".to_vec(),
            fail: false,
            hang: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRemoteFetcher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Never finishes a download
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteFetcher for FakeRemoteFetcher {
    async fn fetch(&self, url: &Url) -> ApiResult<TempPath> {
        self.calls.lock().unwrap().push(url.clone());
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail {
            return Err(ApiError::Fetch(format!(
                "Failed to download image from {}: HTTP 404",
                url
            )));
        }

        let mut file = NamedTempFile::new().map_err(|e| ApiError::Fetch(e.to_string()))?;
        file.write_all(&self.body)
            .map_err(|e| ApiError::Fetch(e.to_string()))?;
        Ok(file.into_temp_path())
    }
}
