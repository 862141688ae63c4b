//! Catalog stores
//!
//! The only code that reads or writes the `image`, `label` and
//! `image_label` tables. Every function takes the pool explicitly and
//! converts sqlx failures into `ApiError::Persistence`.

pub mod image_labels;
pub mod images;
pub mod labels;
