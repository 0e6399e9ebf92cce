//! File store API endpoints
//!
//! - GET /api/v1/storage/buckets/{bucket}/files/{id}/reference - Download locator
//! - GET /api/v1/storage/buckets/{bucket}/files/{id}/download - File bytes
//!
//! Both check enrollment (or ownership) before answering.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::DownloadReference;

/// Build the storage router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/buckets/{bucket}/files/{id}/reference", get(reference))
        .route("/buckets/{bucket}/files/{id}/download", get(download))
}

/// GET /api/v1/storage/buckets/{bucket}/files/{id}/reference
async fn reference(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((bucket, id)): Path<(String, i64)>,
) -> Result<Json<DownloadReference>, ApiError> {
    let reference = state.storage_service.reference(&user.0, &bucket, id).await?;
    Ok(Json(reference))
}

/// GET /api/v1/storage/buckets/{bucket}/files/{id}/download
async fn download(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((bucket, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let (file, bytes) = state.storage_service.download(&user.0, &bucket, id).await?;

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(&file.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Ok(disposition) = HeaderValue::from_str(&content_disposition(&file.original_name)) {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    Ok((headers, bytes))
}

/// `attachment` disposition with an ASCII fallback name and the UTF-8 original
fn content_disposition(original_name: &str) -> String {
    let fallback: String = original_name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(original_name)
    )
}
