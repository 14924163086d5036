//! Request handlers for upload, download and the listing page.
//!
//! Every failure maps to a bare status code with an empty body. Password
//! mismatches are not logged above debug level.

use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use super::AppState;
use crate::files::{PendingUpload, StoreError};

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The supplied password does not match the shared password.
    #[error("unauthorized")]
    Unauthorized,
    /// The requested file does not exist.
    #[error("not found")]
    NotFound,
    /// Body parsing or filesystem failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Internal(_) => {
                error!(error = %self, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Internal(format!("multipart error: {err}"))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        ApiError::Internal(format!("multipart rejected: {err}"))
    }
}

/// Query string accepted by the download route.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub password: Option<String>,
}

/// `POST /upload`: store the multipart `file` field if `password` matches.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<StatusCode, ApiError> {
    let mut multipart = multipart?;
    let mut password: Option<String> = None;
    let mut pending: Option<PendingUpload> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("password") => {
                password = Some(field.text().await?);
            }
            Some("file") if pending.is_none() => {
                let file_name = field
                    .file_name()
                    .map(str::to_owned)
                    .ok_or_else(|| ApiError::Internal("file field has no file name".into()))?;

                let mut upload = state.store.begin_upload(&file_name).await?;
                while let Some(chunk) = field.chunk().await? {
                    upload.write_chunk(&chunk).await?;
                }
                debug!(file = %file_name, bytes = upload.bytes_written, "upload buffered");
                pending = Some(upload);
            }
            _ => {
                while field.chunk().await?.is_some() {}
            }
        }
    }

    if !state.password_matches(password.as_deref()) {
        debug!("upload rejected: wrong password");
        return Err(ApiError::Unauthorized);
    }

    let upload = pending.ok_or_else(|| ApiError::Internal("no file field in upload".into()))?;
    let bytes = upload.bytes_written;
    let destination = state.store.persist(upload).await?;

    info!(file = %destination.display(), bytes, "file uploaded");
    Ok(StatusCode::OK)
}

/// `GET /download/{filename}`: stream the named file as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let path = state.store.locate(&filename).await?.ok_or(ApiError::NotFound)?;

    if !state.password_matches(query.password.as_deref()) {
        debug!(file = %filename, "download rejected: wrong password");
        return Err(ApiError::Unauthorized);
    }

    let file = state.store.open(&path).await?;
    let disposition = HeaderValue::from_bytes(format!("attachment; filename={filename}").as_bytes())
        .map_err(|e| ApiError::Internal(format!("invalid Content-Disposition for {filename:?}: {e}")))?;

    info!(file = %path.display(), "download started");
    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// `GET /`: listing page with upload and download forms.
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let names = state.store.list().await?;
    Ok(Html(super::page::render_index(&names)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_api_error_display() {
        assert_eq!(ApiError::Unauthorized.to_string(), "unauthorized");
        assert_eq!(ApiError::NotFound.to_string(), "not found");
        assert_eq!(
            ApiError::Internal("no file field in upload".into()).to_string(),
            "internal error: no file field in upload"
        );
    }

    #[test]
    fn test_store_error_message_is_kept() {
        let err = ApiError::from(StoreError::IsADirectory(PathBuf::from("/srv/share/folder")));
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(
            err.to_string(),
            "internal error: path is a directory: /srv/share/folder"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("disk".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
