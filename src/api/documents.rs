//! Document API endpoints
//!
//! Collection-addressed CRUD. Query parameters on the list endpoint are
//! filters: `?courseId=3` is an equality test, `?courseId=3&courseId=4` a
//! membership test.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Collection, Document};
use crate::services::DocumentServiceError;

/// Response for a collection listing
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    pub total: usize,
}

/// Build the document router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{collection}/documents",
            get(list_documents).post(create_document),
        )
        .route(
            "/{collection}/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
}

fn collection(name: &str) -> Result<Collection, ApiError> {
    name.parse::<Collection>()
        .map_err(|e| DocumentServiceError::from(e).into())
}

/// GET /api/v1/collections/{collection}/documents
async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(name): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<DocumentList>, ApiError> {
    let collection = collection(&name)?;
    let documents = state
        .document_service
        .list(&user.0, collection, &params)
        .await?;
    Ok(Json(DocumentList {
        total: documents.len(),
        documents,
    }))
}

/// POST /api/v1/collections/{collection}/documents
async fn create_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(name): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let collection = collection(&name)?;
    let document = state
        .document_service
        .create(&user.0, collection, body)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /api/v1/collections/{collection}/documents/{id}
async fn get_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((name, id)): Path<(String, i64)>,
) -> Result<Json<Document>, ApiError> {
    let collection = collection(&name)?;
    let document = state.document_service.get(&user.0, collection, id).await?;
    Ok(Json(document))
}

/// PUT /api/v1/collections/{collection}/documents/{id}
async fn update_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((name, id)): Path<(String, i64)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Document>, ApiError> {
    let collection = collection(&name)?;
    let document = state
        .document_service
        .update(&user.0, collection, id, body)
        .await?;
    Ok(Json(document))
}

/// DELETE /api/v1/collections/{collection}/documents/{id}
async fn delete_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((name, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    let collection = collection(&name)?;
    state
        .document_service
        .delete(&user.0, collection, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
