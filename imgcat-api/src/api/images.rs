//! Image catalog API handlers
//!
//! GET /images, GET /images/:id, POST /images

use axum::{
    extract::{multipart::Field, multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    file_key_from_upload, parse_source_url, CompositeImageRecord, ImageSource, IngestRequest,
};
use crate::AppState;

const SUCCESS: &str = "SUCCESS";

/// GET /images query
#[derive(Debug, Deserialize)]
pub struct ListImagesQuery {
    /// Comma-separated label names; every one must be present on a match
    pub objects: Option<String>,
}

/// GET /images response
#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub status: &'static str,
    pub images: Vec<CompositeImageRecord>,
}

/// GET /images/:id and POST /images response
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub record: CompositeImageRecord,
}

/// GET /images
///
/// Without `objects` lists every image; with it, filters by label set.
pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ListImagesQuery>,
) -> ApiResult<Json<ImagesResponse>> {
    let images = match query.objects.as_deref() {
        Some(objects) => state.retrieval.get_by_label_set(objects.split(',')).await?,
        None => state.retrieval.get_all().await?,
    };

    Ok(Json(ImagesResponse {
        status: SUCCESS,
        images,
    }))
}

/// GET /images/:id
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ImageResponse>> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Image id must be an integer: {}", id)))?;

    let record = state.retrieval.get_by_id(id).await?;

    Ok(Json(ImageResponse {
        status: SUCCESS,
        record,
    }))
}

/// POST /images
///
/// Multipart fields: `url`, `label`, `analyze` ("true" to run detection)
/// and `file` when no `url` is given.
pub async fn create_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ImageResponse>> {
    let form = ImageForm::read(multipart).await?;
    // The spooled upload must outlive the ingestion
    let (request, _upload) = form.into_request()?;

    let record = match state.ingestion.ingest(request).await {
        Ok(record) => record,
        Err(err) => {
            warn!(error = %err, "Image ingestion failed");
            state.record_error(&err).await;
            return Err(err);
        }
    };

    Ok(Json(ImageResponse {
        status: SUCCESS,
        record,
    }))
}

/// File part spooled to disk
#[derive(Debug)]
struct UploadedFile {
    original_name: String,
    path: TempPath,
}

/// Raw multipart fields, before validation
#[derive(Debug, Default)]
struct ImageForm {
    url: Option<String>,
    label: Option<String>,
    analyze: Option<String>,
    file: Option<UploadedFile>,
}

fn bad_multipart(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge("upload exceeds the configured size limit".to_string());
    }
    ApiError::BadRequest(format!("Malformed multipart body: {}", err))
}

fn spool_error(err: std::io::Error) -> ApiError {
    ApiError::Common(imgcat_common::Error::Io(err))
}

impl ImageForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "url" => form.url = Some(field.text().await.map_err(bad_multipart)?),
                "label" => form.label = Some(field.text().await.map_err(bad_multipart)?),
                "analyze" => form.analyze = Some(field.text().await.map_err(bad_multipart)?),
                "file" => form.file = spool_upload(field).await?,
                other => debug!(field = other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    /// Validate into an [`IngestRequest`]
    ///
    /// Returns the upload's temp path alongside the request; dropping it
    /// deletes the spooled bytes.
    fn into_request(self) -> ApiResult<(IngestRequest, Option<TempPath>)> {
        let url = self.url.filter(|u| !u.trim().is_empty());
        let label = self.label.filter(|l| !l.is_empty());
        let analyze = self.analyze.as_deref() == Some("true");

        match (url, self.file) {
            (Some(_), Some(_)) => Err(ApiError::BadRequest(
                "Provide either a url or a file, not both".to_string(),
            )),
            (Some(url), None) => {
                let request = IngestRequest {
                    source: ImageSource::Url(parse_source_url(&url)?),
                    label,
                    analyze,
                };
                Ok((request, None))
            }
            (None, Some(file)) => {
                file_key_from_upload(&file.original_name)?;
                let request = IngestRequest {
                    source: ImageSource::Upload {
                        local_path: file.path.to_path_buf(),
                        original_name: file.original_name,
                    },
                    label,
                    analyze,
                };
                Ok((request, Some(file.path)))
            }
            (None, None) => Err(ApiError::BadRequest(
                "Either a url or a file is required".to_string(),
            )),
        }
    }
}

/// Stream a file part into a temp file
///
/// A part without a file name or without content counts as no file.
async fn spool_upload(mut field: Field<'_>) -> ApiResult<Option<UploadedFile>> {
    let original_name = match field.file_name() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Ok(None),
    };

    let path = NamedTempFile::new().map_err(spool_error)?.into_temp_path();
    let mut file = tokio::fs::File::create(&path).await.map_err(spool_error)?;

    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
        size += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(spool_error)?;
    }
    file.flush().await.map_err(spool_error)?;

    if size == 0 {
        return Ok(None);
    }

    debug!(file_name = %original_name, bytes = size, "Spooled upload");

    Ok(Some(UploadedFile {
        original_name,
        path,
    }))
}

/// Build image routes
pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/images", get(list_images).post(create_image))
        .route("/images/:id", get(get_image))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            original_name: name.to_string(),
            path: NamedTempFile::new().unwrap().into_temp_path(),
        }
    }

    #[test]
    fn test_url_form() {
        let form = ImageForm {
            url: Some("https://x/y/photo.png".into()),
            analyze: Some("true".into()),
            ..Default::default()
        };

        let (request, upload) = form.into_request().unwrap();

        assert!(upload.is_none());
        assert!(request.analyze);
        assert_eq!(request.label, None);
        assert!(matches!(request.source, ImageSource::Url(ref u) if u.as_str() == "https://x/y/photo.png"));
    }

    #[test]
    fn test_analyze_only_for_exact_true() {
        for value in ["TRUE", "1", "yes", ""] {
            let form = ImageForm {
                url: Some("https://x/y/photo.png".into()),
                analyze: Some(value.into()),
                ..Default::default()
            };
            assert!(!form.into_request().unwrap().0.analyze, "{value}");
        }
    }

    #[test]
    fn test_file_form() {
        let form = ImageForm {
            label: Some("Holiday".into()),
            file: Some(upload("beach.jpg")),
            ..Default::default()
        };

        let (request, spooled) = form.into_request().unwrap();
        let spooled = spooled.expect("upload path kept alive");

        match request.source {
            ImageSource::Upload {
                local_path,
                original_name,
            } => {
                assert_eq!(original_name, "beach.jpg");
                assert_eq!(local_path, spooled.to_path_buf());
            }
            other => panic!("unexpected source {:?}", other),
        }
        assert_eq!(request.label.as_deref(), Some("Holiday"));
    }

    #[test]
    fn test_blank_url_falls_back_to_file() {
        let form = ImageForm {
            url: Some("  ".into()),
            file: Some(upload("beach.jpg")),
            ..Default::default()
        };

        assert!(form.into_request().is_ok());
    }

    #[test]
    fn test_both_sources_rejected() {
        let form = ImageForm {
            url: Some("https://x/y/photo.png".into()),
            file: Some(upload("beach.jpg")),
            ..Default::default()
        };

        assert!(matches!(form.into_request(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_no_source_rejected() {
        assert!(matches!(
            ImageForm::default().into_request(),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_invalid_upload_name_rejected() {
        let form = ImageForm {
            file: Some(upload("..")),
            ..Default::default()
        };

        assert!(matches!(form.into_request(), Err(ApiError::BadRequest(_))));
    }
}
