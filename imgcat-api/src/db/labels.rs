//! Label vocabulary store
//!
//! Label names are a controlled vocabulary keyed by name. Inserting a name
//! that already exists is a no-op, which also makes concurrent ingestions
//! that detect the same label safe.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{ApiError, ApiResult};

/// Insert label names, ignoring ones already present
///
/// Returns the number of names actually added.
pub async fn insert_labels(pool: &SqlitePool, names: &[String]) -> ApiResult<u64> {
    if names.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO label (name) ");
    builder.push_values(names, |mut row, name| {
        row.push_bind(name.as_str());
    });
    builder.push(" ON CONFLICT (name) DO NOTHING");

    let result = builder
        .build()
        .execute(pool)
        .await
        .map_err(ApiError::persistence("Error inserting labels"))?;

    Ok(result.rows_affected())
}
