//! Image-label association store
//!
//! Junction between `image` and `label` with the detector confidence.
//! `(image_id, label_id)` is unique; repeated inserts are dropped.

use std::collections::BTreeSet;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{ApiError, ApiResult};
use crate::models::IdentifiedObject;

/// Associate labels with an image, ignoring pairs that already exist
///
/// Every label name must already be in the vocabulary. Returns the rows
/// actually inserted.
pub async fn insert_image_labels(
    pool: &SqlitePool,
    image_id: i64,
    objects: &[IdentifiedObject],
) -> ApiResult<Vec<IdentifiedObject>> {
    if objects.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO image_label (image_id, label_id, conf) ");
    builder.push_values(objects, |mut row, object| {
        row.push_bind(image_id)
            .push_bind(object.label.as_str())
            .push_bind(object.conf);
    });
    builder.push(" ON CONFLICT (image_id, label_id) DO NOTHING RETURNING label_id AS label, conf");

    builder
        .build_query_as::<IdentifiedObject>()
        .fetch_all(pool)
        .await
        .map_err(ApiError::persistence("Error inserting imageLabels"))
}

/// Labels associated with one image
pub async fn load_labels_for_image(
    pool: &SqlitePool,
    image_id: i64,
) -> ApiResult<Vec<IdentifiedObject>> {
    sqlx::query_as::<_, IdentifiedObject>(
        r#"
        SELECT l.name AS label, il.conf
        FROM image_label il
        INNER JOIN label l ON l.name = il.label_id
        WHERE il.image_id = ?
        ORDER BY il.rowid
        "#,
    )
    .bind(image_id)
    .fetch_all(pool)
    .await
    .map_err(ApiError::persistence("Error finding image labels"))
}

/// Ids of images associated with every label in `labels`
///
/// Groups the matching association rows per image and keeps groups whose
/// distinct-label count equals the number of requested labels. Images may
/// carry other labels too. Callers pass already-normalized, non-empty sets.
pub async fn find_image_ids_with_all_labels(
    pool: &SqlitePool,
    labels: &BTreeSet<String>,
) -> ApiResult<Vec<i64>> {
    if labels.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT i.id FROM image_label il \
         INNER JOIN image i ON i.id = il.image_id \
         WHERE il.label_id IN (",
    );
    let mut separated = builder.separated(", ");
    for label in labels {
        separated.push_bind(label.as_str());
    }
    separated.push_unseparated(") GROUP BY i.id HAVING COUNT(DISTINCT il.label_id) = ");
    builder.push_bind(labels.len() as i64);
    builder.push(" ORDER BY i.id");

    builder
        .build_query_scalar::<i64>()
        .fetch_all(pool)
        .await
        .map_err(ApiError::persistence("Error finding images by labels"))
}
