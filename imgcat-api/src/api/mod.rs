//! HTTP API handlers for imgcat-api
//!
//! - `GET /images[?objects=a,b]`
//! - `GET /images/:id`
//! - `POST /images` (multipart)
//! - `GET /health`

pub mod health;
pub mod images;

pub use health::health_routes;
pub use images::image_routes;
