//! Object store adapters
//!
//! Both adapters derive public URLs by appending the (percent-encoded) key
//! to a fixed base URL, so an image's `url` column is a pure function of
//! its `name`.

use async_trait::async_trait;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{ObjectStore, StoredObject};
use crate::error::{ApiError, ApiResult};
use imgcat_common::{Error, Result};

const UPLOAD_ERROR: &str = "Image Upload Error";

/// Append `key` as a single path segment of `base`
fn object_url(base: &Url, key: &str) -> String {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(key);
    }
    url.to_string()
}

fn parse_base_url(name: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", name, raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("{} '{}' cannot hold object paths", name, raw)));
    }
    Ok(url)
}

/// Stores objects as files in a local directory
///
/// Objects are expected to be served under `public_base_url` (the router
/// mounts the directory at `/objects`).
pub struct FileSystemObjectStore {
    root: PathBuf,
    public_base: Url,
}

impl FileSystemObjectStore {
    pub fn new(root: PathBuf, public_base_url: &str) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        let public_base = parse_base_url("storage.public_base_url", public_base_url)?;

        info!(
            "Filesystem object store at {} (public base {})",
            root.display(),
            public_base
        );

        Ok(Self { root, public_base })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for FileSystemObjectStore {
    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    fn public_url(&self, key: &str) -> String {
        object_url(&self.public_base, key)
    }

    async fn put(&self, local_path: &Path, key: &str) -> ApiResult<StoredObject> {
        if key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(ApiError::Storage(format!("{}: invalid key '{}'", UPLOAD_ERROR, key)));
        }

        let destination = self.root.join(key);
        let bytes = tokio::fs::copy(local_path, &destination).await.map_err(|e| {
            error!(key, error = %e, "Failed to copy object into {}", self.root.display());
            ApiError::Storage(UPLOAD_ERROR.to_string())
        })?;

        debug!(key, bytes, "Stored object on filesystem");

        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
        })
    }
}

/// Path-style S3-compatible HTTP object store
///
/// Uploads with `PUT <endpoint>/<bucket>/<key>`.
pub struct HttpObjectStore {
    client: reqwest::Client,
    bucket_url: Url,
    public_base: Url,
    auth_token: Option<String>,
}

impl HttpObjectStore {
    /// `public_base_url` defaults to `<endpoint>/<bucket>`
    pub fn new(
        endpoint: &str,
        bucket: &str,
        public_base_url: Option<&str>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Self::with_client(client, endpoint, bucket, public_base_url, auth_token)
    }

    /// Same as [`HttpObjectStore::new`] with a caller-supplied client
    pub fn with_client(
        client: reqwest::Client,
        endpoint: &str,
        bucket: &str,
        public_base_url: Option<&str>,
        auth_token: Option<String>,
    ) -> Result<Self> {
        let endpoint = parse_base_url("storage.endpoint", endpoint)?;
        let bucket_url = parse_base_url("storage.bucket", &object_url(&endpoint, bucket))?;
        let public_base = match public_base_url {
            Some(raw) => parse_base_url("storage.public_base_url", raw)?,
            None => bucket_url.clone(),
        };

        info!("HTTP object store at {} (public base {})", bucket_url, public_base);

        Ok(Self {
            client,
            bucket_url,
            public_base,
            auth_token,
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    fn public_url(&self, key: &str) -> String {
        object_url(&self.public_base, key)
    }

    async fn put(&self, local_path: &Path, key: &str) -> ApiResult<StoredObject> {
        let bytes = tokio::fs::read(local_path).await.map_err(|e| {
            error!(key, error = %e, "Failed to read {} for upload", local_path.display());
            ApiError::Storage(UPLOAD_ERROR.to_string())
        })?;

        let content_type = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream");
        let target = object_url(&self.bucket_url, key);

        debug!(key, url = %target, content_type, size = bytes.len(), "Uploading object");

        let mut request = self
            .client
            .put(&target)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!(key, error = %e, "Object upload request failed");
            ApiError::Storage(UPLOAD_ERROR.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(key, status = status.as_u16(), body = %body, "Object store rejected upload");
            return Err(ApiError::Storage(UPLOAD_ERROR.to_string()));
        }

        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
        })
    }
}
