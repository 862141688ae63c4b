//! Error types for imgcat-api
//!
//! Every collaborator failure (remote fetch, object store, database,
//! label detector) is converted into one of these kinds where it happens.
//! Each kind carries the HTTP status the route layer reports.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Remote image download failed (network, non-2xx, oversize, timeout)
    #[error("FetchException: {0}")]
    Fetch(String),

    /// Object-store write failed
    #[error("ServiceException: {0}")]
    Storage(String),

    /// Relational read or write failed
    #[error("StorageException: {0}")]
    Persistence(String),

    /// Detector rejected the object's encoding (400)
    #[error("ServiceException: {0}")]
    InvalidFormat(String),

    /// Detector call failed for any other reason
    #[error("ServiceException: {0}")]
    Detection(String),

    /// Requested image id does not exist (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed request, rejected before ingestion starts (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body exceeds the upload limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Bootstrap error surfaced at runtime
    #[error(transparent)]
    Common(#[from] imgcat_common::Error),
}

impl ApiError {
    /// HTTP status reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Fetch(_)
            | ApiError::Storage(_)
            | ApiError::Persistence(_)
            | ApiError::Detection(_)
            | ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build a mapper for database failures
    ///
    /// The sqlx error is logged with `context`; only `context` reaches the client.
    pub fn persistence(context: &'static str) -> impl FnOnce(sqlx::Error) -> ApiError {
        move |err| {
            tracing::error!(error = %err, "{}", context);
            ApiError::Persistence(context.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "status": "FAILURE",
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type for catalog operations and API handlers
pub type ApiResult<T> = Result<T, ApiError>;
