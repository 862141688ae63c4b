//! imgcat-api - Image catalog service
//!
//! Accepts images by upload or remote URL, stores them in object storage,
//! optionally runs label detection, and serves the catalog over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use imgcat_common::config::{
    resolve_config_path, resolve_root_folder, RootFolderInitializer, TomlConfig,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use imgcat_api::services::{IngestionOrchestrator, RetrievalEngine};
use imgcat_api::{build_router, config, AppState};

/// Command-line arguments (highest configuration priority)
#[derive(Debug, Parser)]
#[command(name = "imgcat-api", version, about = "Image catalog service")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root folder holding the database and filesystem objects
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long, env = "IMGCAT_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// HTTP port
    #[arg(long, env = "IMGCAT_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut toml_config = TomlConfig::load_or_default(&config_path)?;
    if let Some(bind_address) = args.bind_address {
        toml_config.bind_address = bind_address;
    }
    if let Some(port) = args.port {
        toml_config.port = port;
    }

    // RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting imgcat-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Configuration: {}", config_path.display());

    // Step 1: Resolve and create root folder
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    // Step 2: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = imgcat_common::db::init_database(&db_path).await?;

    // Step 3: Collaborators
    let (store, objects_dir) = config::build_object_store(&toml_config, initializer.root_folder())?;
    let detector = config::build_label_detector(&toml_config)?;
    let fetcher = config::build_remote_fetcher(&toml_config)?;

    let ingestion = IngestionOrchestrator::new(db_pool.clone(), store, detector, fetcher)
        .with_timeouts(config::ingest_timeouts(&toml_config));
    let retrieval = RetrievalEngine::new(db_pool);

    let max_upload_bytes = usize::try_from(toml_config.max_upload_bytes).unwrap_or(usize::MAX);
    let state = AppState::new(ingestion, retrieval)
        .with_objects_dir(objects_dir)
        .with_max_upload_bytes(max_upload_bytes);

    let app = build_router(state);

    let bind = format!("{}:{}", toml_config.bind_address, toml_config.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
