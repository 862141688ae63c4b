//! Retrieval engine
//!
//! Every read returns full composite records (image row + its labels).

use futures::future::try_join_all;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use tracing::debug;

use crate::db::{image_labels, images};
use crate::error::{ApiError, ApiResult};
use crate::models::{normalize_label, CompositeImageRecord};

#[derive(Clone)]
pub struct RetrievalEngine {
    db: SqlitePool,
}

impl RetrievalEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// One image with its labels; `NotFound` when the id does not exist
    pub async fn get_by_id(&self, id: i64) -> ApiResult<CompositeImageRecord> {
        let (image, objects_identified) = tokio::try_join!(
            images::load_image(&self.db, id),
            image_labels::load_labels_for_image(&self.db, id),
        )?;

        let image = image.ok_or_else(|| ApiError::NotFound(format!("Image {} not found", id)))?;

        Ok(CompositeImageRecord {
            image,
            objects_identified,
        })
    }

    /// Every image with its labels
    pub async fn get_all(&self) -> ApiResult<Vec<CompositeImageRecord>> {
        let ids = images::list_image_ids(&self.db).await?;
        self.resolve_all(ids).await
    }

    /// Images carrying every requested label (other labels allowed)
    ///
    /// Names are normalized before matching. An empty set after
    /// normalization applies no filter and returns every image.
    pub async fn get_by_label_set<I, S>(&self, labels: I) -> ApiResult<Vec<CompositeImageRecord>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested = normalize_label_set(labels);
        if requested.is_empty() {
            debug!("Empty label filter; returning all images");
            return self.get_all().await;
        }

        let ids = image_labels::find_image_ids_with_all_labels(&self.db, &requested).await?;
        debug!(labels = ?requested, matches = ids.len(), "Label set query");

        self.resolve_all(ids).await
    }

    /// Catalog size; also serves as a database liveness probe
    pub async fn count(&self) -> ApiResult<i64> {
        images::count_images(&self.db).await
    }

    async fn resolve_all(&self, ids: Vec<i64>) -> ApiResult<Vec<CompositeImageRecord>> {
        try_join_all(ids.into_iter().map(|id| self.get_by_id(id))).await
    }
}

/// Trim, lower-case and de-duplicate label names, dropping empty ones
pub fn normalize_label_set<I, S>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|label| normalize_label(label.as_ref()))
        .filter(|label| !label.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label_set() {
        let set = normalize_label_set(["Cat", " pet", "cat", "", "  "]);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["cat", "pet"]);
    }

    #[test]
    fn test_normalize_empty_query() {
        assert!(normalize_label_set("".split(',')).is_empty());
        assert!(normalize_label_set(",,".split(',')).is_empty());
    }
}
