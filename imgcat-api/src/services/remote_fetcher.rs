//! Remote image download

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::RemoteFetcher;
use crate::error::{ApiError, ApiResult};
use imgcat_common::{Error, Result};

/// Streams a remote resource into a temp file, bounded by `max_bytes`
pub struct HttpRemoteFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpRemoteFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, max_bytes))
    }

    /// Same as [`HttpRemoteFetcher::new`] with a caller-supplied client
    pub fn with_client(client: reqwest::Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }

    fn too_large(&self, url: &Url) -> ApiError {
        ApiError::Fetch(format!(
            "Image at {} exceeds the {} byte download limit",
            url, self.max_bytes
        ))
    }
}

fn spool_error(url: &Url, err: std::io::Error) -> ApiError {
    warn!(url = %url, error = %err, "Failed to write downloaded image to temp file");
    ApiError::Fetch(format!("Failed to download image from {}", url))
}

#[async_trait]
impl RemoteFetcher for HttpRemoteFetcher {
    async fn fetch(&self, url: &Url) -> ApiResult<TempPath> {
        debug!(url = %url, "Downloading image");

        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Image download failed");
            ApiError::Fetch(format!("Failed to download image from {}", url))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Fetch(format!(
                "Failed to download image from {}: HTTP {}",
                url,
                status.as_u16()
            )));
        }

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(self.too_large(url));
        }

        let path = NamedTempFile::new()
            .map_err(|e| spool_error(url, e))?
            .into_temp_path();
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| spool_error(url, e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            warn!(url = %url, error = %e, "Image download interrupted");
            ApiError::Fetch(format!("Failed to download image from {}", url))
        })? {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(self.too_large(url));
            }
            file.write_all(&chunk).await.map_err(|e| spool_error(url, e))?;
        }
        file.flush().await.map_err(|e| spool_error(url, e))?;

        debug!(url = %url, bytes = written, "Image downloaded");

        Ok(path)
    }
}
