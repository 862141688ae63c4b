//! Image record store

use sqlx::SqlitePool;

use crate::error::{ApiError, ApiResult};
use crate::models::{Image, NewImage};

/// Insert an image row and return its generated id
pub async fn insert_image(pool: &SqlitePool, image: &NewImage) -> ApiResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO image (name, label, url)
        VALUES (?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&image.name)
    .bind(&image.label)
    .bind(&image.url)
    .fetch_one(pool)
    .await
    .map_err(ApiError::persistence("Error inserting image"))?;

    tracing::debug!(image_id = id, name = %image.name, "Inserted image row");

    Ok(id)
}

/// Load an image row by id
pub async fn load_image(pool: &SqlitePool, id: i64) -> ApiResult<Option<Image>> {
    sqlx::query_as::<_, Image>("SELECT id, name, label, url FROM image WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::persistence("Error finding image"))
}

/// Ids of every stored image
pub async fn list_image_ids(pool: &SqlitePool) -> ApiResult<Vec<i64>> {
    sqlx::query_scalar("SELECT id FROM image ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(ApiError::persistence("Error finding all images"))
}

/// Number of stored images
pub async fn count_images(pool: &SqlitePool) -> ApiResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM image")
        .fetch_one(pool)
        .await
        .map_err(ApiError::persistence("Error counting images"))
}
