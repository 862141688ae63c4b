//! # imgcat Common Library
//!
//! Shared code for the image catalog service:
//! - Error type used by configuration and database bootstrap
//! - Bootstrap configuration loading (TOML, root folder resolution)
//! - Database initialization and catalog schema

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
