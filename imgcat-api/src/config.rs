//! Service configuration resolution for imgcat-api
//!
//! Turns the bootstrap [`TomlConfig`] into concrete collaborators.
//! Secrets resolve with ENV → TOML priority.

use imgcat_common::config::{StorageBackend, TomlConfig};
use imgcat_common::{Error, Result};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::services::{
    DisabledLabelDetector, FileSystemObjectStore, HttpLabelDetector, HttpObjectStore,
    HttpRemoteFetcher, IngestTimeouts, LabelDetector, ObjectStore, RemoteFetcher,
};

/// Environment variable holding the label detector key
pub const DETECTOR_API_KEY_ENV: &str = "IMGCAT_DETECTOR_API_KEY";

/// Environment variable holding the object store bearer token
pub const STORAGE_TOKEN_ENV: &str = "IMGCAT_STORAGE_TOKEN";

/// Validate secret (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve a secret from the environment, then TOML
pub fn resolve_secret(name: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment and TOML. Using environment (highest priority).",
            name
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", name);
        return Some(value);
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", name);
        return Some(value.to_string());
    }

    None
}

/// Wildcard bind addresses (`0.0.0.0`, `::`) are not addresses clients can use
fn is_unspecified_address(bind_address: &str) -> bool {
    bind_address
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_unspecified())
}

/// Object store plus the directory to serve under `/objects` (filesystem backend only)
pub fn build_object_store(
    config: &TomlConfig,
    root_folder: &Path,
) -> Result<(Arc<dyn ObjectStore>, Option<PathBuf>)> {
    let storage = &config.storage;

    match storage.backend {
        StorageBackend::Filesystem => {
            let objects_dir = config.objects_dir(root_folder);
            let public_base = match storage.public_base_url.clone() {
                Some(base) => base,
                None if is_unspecified_address(&config.bind_address) => {
                    return Err(Error::Config(format!(
                        "storage.public_base_url is required when binding to {}; \
                         image URLs must be reachable by clients",
                        config.bind_address
                    )))
                }
                None => format!("{}/objects", config.server_base_url()),
            };
            let store = FileSystemObjectStore::new(objects_dir.clone(), &public_base)?;
            Ok((Arc::new(store), Some(objects_dir)))
        }
        StorageBackend::Http => {
            let endpoint = storage.endpoint.as_deref().ok_or_else(|| {
                Error::Config("storage.endpoint is required for the http backend".to_string())
            })?;
            let bucket = storage.bucket.as_deref().ok_or_else(|| {
                Error::Config("storage.bucket is required for the http backend".to_string())
            })?;
            let token = resolve_secret(
                "Storage token",
                STORAGE_TOKEN_ENV,
                storage.auth_token.as_deref(),
            );
            let store = HttpObjectStore::new(
                endpoint,
                bucket,
                storage.public_base_url.as_deref(),
                token,
                Duration::from_secs(config.fetch.timeout_secs),
            )?;
            Ok((Arc::new(store), None))
        }
    }
}

/// Label detector, or a disabled stand-in when no endpoint is configured
pub fn build_label_detector(config: &TomlConfig) -> Result<Arc<dyn LabelDetector>> {
    match config.detector.endpoint.as_deref() {
        Some(endpoint) => {
            let api_key = resolve_secret(
                "Detector API key",
                DETECTOR_API_KEY_ENV,
                config.detector.api_key.as_deref(),
            );
            info!("Label detector endpoint: {}", endpoint);
            Ok(Arc::new(HttpLabelDetector::new(
                endpoint,
                api_key,
                Duration::from_secs(config.detector.timeout_secs),
            )?))
        }
        None => {
            warn!("No detector.endpoint configured; analyze=true requests will fail");
            Ok(Arc::new(DisabledLabelDetector))
        }
    }
}

pub fn build_remote_fetcher(config: &TomlConfig) -> Result<Arc<dyn RemoteFetcher>> {
    Ok(Arc::new(HttpRemoteFetcher::new(
        Duration::from_secs(config.fetch.timeout_secs),
        config.fetch.max_bytes,
    )?))
}

pub fn ingest_timeouts(config: &TomlConfig) -> IngestTimeouts {
    IngestTimeouts {
        fetch: Duration::from_secs(config.fetch.timeout_secs),
        detect: Duration::from_secs(config.detector.timeout_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    #[serial]
    fn test_secret_env_beats_toml() {
        std::env::set_var("IMGCAT_TEST_SECRET", "from-env");
        let resolved = resolve_secret("Test secret", "IMGCAT_TEST_SECRET", Some("from-toml"));
        std::env::remove_var("IMGCAT_TEST_SECRET");

        assert_eq!(resolved.as_deref(), Some("from-env"));
    }

    #[test]
    #[serial]
    fn test_secret_falls_back_to_toml() {
        std::env::remove_var("IMGCAT_TEST_SECRET");
        assert_eq!(
            resolve_secret("Test secret", "IMGCAT_TEST_SECRET", Some("from-toml")).as_deref(),
            Some("from-toml")
        );
        assert_eq!(resolve_secret("Test secret", "IMGCAT_TEST_SECRET", Some("  ")), None);
    }

    #[test]
    fn test_filesystem_store_served_from_root() {
        let dir = TempDir::new().unwrap();
        let config = TomlConfig::default();

        let (store, served) = build_object_store(&config, dir.path()).unwrap();

        assert_eq!(served, Some(dir.path().join("objects")));
        assert_eq!(store.backend_name(), "filesystem");
        assert_eq!(store.public_url("a.png"), "http://127.0.0.1:3000/objects/a.png");
    }

    #[test]
    fn test_wildcard_bind_requires_public_base_url() {
        let dir = TempDir::new().unwrap();

        for bind in ["0.0.0.0", "::", "[::]"] {
            let mut config = TomlConfig::default();
            config.bind_address = bind.to_string();

            assert!(
                matches!(build_object_store(&config, dir.path()), Err(Error::Config(_))),
                "{bind}"
            );

            config.storage.public_base_url = Some("https://images.example.com/objects".into());
            let (store, _) = build_object_store(&config, dir.path()).unwrap();
            assert_eq!(
                store.public_url("a.png"),
                "https://images.example.com/objects/a.png"
            );
        }
    }

    #[test]
    fn test_specific_bind_address_used_for_public_urls() {
        let dir = TempDir::new().unwrap();
        let mut config = TomlConfig::default();
        config.bind_address = "192.168.1.20".to_string();
        config.port = 8080;

        let (store, _) = build_object_store(&config, dir.path()).unwrap();

        assert_eq!(store.public_url("a.png"), "http://192.168.1.20:8080/objects/a.png");
    }

    #[test]
    fn test_http_store_requires_endpoint_and_bucket() {
        let dir = TempDir::new().unwrap();
        let mut config = TomlConfig::default();
        config.storage.backend = StorageBackend::Http;

        assert!(matches!(
            build_object_store(&config, dir.path()),
            Err(Error::Config(_))
        ));

        config.storage.endpoint = Some("https://s3.example.com".into());
        assert!(matches!(
            build_object_store(&config, dir.path()),
            Err(Error::Config(_))
        ));

        config.storage.bucket = Some("catalog".into());
        let (store, served) = build_object_store(&config, dir.path()).unwrap();
        assert!(served.is_none());
        assert_eq!(store.public_url("a.png"), "https://s3.example.com/catalog/a.png");
    }

    #[test]
    fn test_timeouts_follow_config() {
        let mut config = TomlConfig::default();
        config.fetch.timeout_secs = 7;
        config.detector.timeout_secs = 11;

        let timeouts = ingest_timeouts(&config);
        assert_eq!(timeouts.fetch, Duration::from_secs(7));
        assert_eq!(timeouts.detect, Duration::from_secs(11));
    }
}
