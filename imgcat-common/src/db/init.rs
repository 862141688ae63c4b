//! Database initialization
//!
//! Opens (or creates) the catalog database and ensures the three catalog
//! tables exist:
//! - `image`: one row per ingested image
//! - `label`: controlled vocabulary of detected label names
//! - `image_label`: image ↔ label junction with detector confidence
//!
//! All statements are `IF NOT EXISTS`, so initialization is safe to repeat.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // foreign_keys is a per-connection pragma; setting it on the connect
    // options applies it to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Initialize a private in-memory database with the catalog schema
///
/// Each SQLite memory connection is its own database, so the pool is pinned
/// to a single connection that never expires.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all catalog tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_image_table(pool).await?;
    create_label_table(pool).await?;
    create_image_label_table(pool).await?;
    Ok(())
}

async fn create_image_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            label TEXT NOT NULL,
            url TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_label_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS label (
            name TEXT PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_image_label_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image_label (
            image_id INTEGER NOT NULL REFERENCES image(id) ON DELETE CASCADE,
            label_id TEXT NOT NULL REFERENCES label(name),
            conf REAL NOT NULL CHECK (conf > 90 AND conf <= 100),
            UNIQUE (image_id, label_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Set-match queries filter on label_id first
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_image_label_label_id ON image_label(label_id)")
        .execute(pool)
        .await?;

    Ok(())
}
