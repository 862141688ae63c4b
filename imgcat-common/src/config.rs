//! Bootstrap configuration loading and root folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not an error: the service logs a warning and
//! starts with defaults. A TOML file that exists but fails to parse is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "IMGCAT_ROOT_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_FILE_ENV: &str = "IMGCAT_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "imgcat.db";

/// Object directory name inside the root folder (filesystem storage backend)
pub const OBJECTS_DIR_NAME: &str = "objects";

const DEFAULT_MAX_BYTES: u64 = 25 * 1024 * 1024;

/// Bootstrap configuration loaded from TOML
///
/// Every field has a default so an empty file (or no file) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and filesystem objects
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted multipart upload, in bytes
    #[serde(default = "default_max_bytes")]
    pub max_upload_bytes: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            max_upload_bytes: default_max_bytes(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            detector: DetectorConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Which object store implementation backs uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Objects copied into a local directory and served under `/objects`
    #[default]
    Filesystem,
    /// Objects PUT to an S3-compatible HTTP endpoint (path-style)
    Http,
}

/// Object storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Filesystem backend: directory for objects (default `<root>/objects`)
    #[serde(default)]
    pub objects_dir: Option<PathBuf>,

    /// HTTP backend: base endpoint, e.g. `https://s3.example.com`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// HTTP backend: bucket name appended to the endpoint path
    #[serde(default)]
    pub bucket: Option<String>,

    /// Base URL under which stored objects are publicly readable
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// HTTP backend: bearer token (prefer `IMGCAT_STORAGE_TOKEN`)
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Label detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Classifier endpoint; detection is disabled when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer key for the classifier (prefer `IMGCAT_DETECTOR_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Remote image download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Downloads larger than this are aborted
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl TomlConfig {
    /// Load configuration from `path`, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file not found at {}; using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content).map_err(|source| Error::TomlParse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Objects directory for the filesystem backend
    pub fn objects_dir(&self, root_folder: &Path) -> PathBuf {
        self.storage
            .objects_dir
            .clone()
            .unwrap_or_else(|| root_folder.join(OBJECTS_DIR_NAME))
    }

    /// Base URL of this server as seen by clients
    pub fn server_base_url(&self) -> String {
        format!("http://{}:{}", self.bind_address, self.port)
    }
}

/// Locate the TOML config file
///
/// Priority: command line → `IMGCAT_CONFIG` → `<config dir>/imgcat/config.toml`
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|d| d.join("imgcat").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("imgcat.toml"))
}

/// Root folder resolution
///
/// Priority: command line → `IMGCAT_ROOT_FOLDER` → TOML `root_folder` → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/imgcat
        dirs::data_local_dir()
            .map(|d| d.join("imgcat"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/imgcat"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/imgcat
        dirs::data_dir()
            .map(|d| d.join("imgcat"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/imgcat"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\imgcat
        dirs::data_local_dir()
            .map(|d| d.join("imgcat"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\imgcat"))
    } else {
        PathBuf::from("./imgcat_data")
    }
}

/// Creates the root folder and derives the paths that live beneath it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
        assert_eq!(config.detector.timeout_secs, 30);
        assert_eq!(config.fetch.max_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn test_objects_dir_defaults_under_root() {
        let config = TomlConfig::default();
        let root = PathBuf::from("/srv/imgcat");
        assert_eq!(config.objects_dir(&root), root.join("objects"));
    }

    #[test]
    fn test_server_base_url() {
        let config = TomlConfig {
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.server_base_url(), "http://127.0.0.1:8080");
    }
}
