//! Course API endpoints
//!
//! - GET /api/v1/courses - Published catalog, optional repeated `category`
//! - POST /api/v1/courses/{id}/enroll - Checkout
//! - GET /api/v1/courses/{id}/content - Course page with filtered files
//! - GET /api/v1/courses/{id}/stats - Enrollment count and revenue
//! - POST /api/v1/courses/{id}/files - Upload course content (multipart)

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Course, Enrollment, FileMetadata};
use crate::services::{CourseContent, UploadInput};
use crate::validation::FieldErrors;
use crate::views::{ContentCategory, CourseStats};

/// Build the course router (requires auth middleware)
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(catalog))
        .route("/{id}/enroll", post(enroll))
        .route("/{id}/content", get(content))
        .route("/{id}/stats", get(stats))
        .route(
            "/{id}/files",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

/// GET /api/v1/courses
async fn catalog(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Course>>, ApiError> {
    let categories: Vec<String> = params
        .into_iter()
        .filter(|(name, _)| name == "category")
        .map(|(_, value)| value)
        .collect();
    let courses = state.course_service.catalog(&categories).await?;
    Ok(Json(courses))
}

/// POST /api/v1/courses/{id}/enroll
async fn enroll(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Enrollment>), ApiError> {
    let enrollment = state.course_service.enroll(&user.0, id).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// Query parameters for the course page
#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: String,
}

/// GET /api/v1/courses/{id}/content
async fn content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<CourseContent>, ApiError> {
    let category: ContentCategory = query.category.parse().map_err(|e: anyhow::Error| {
        let mut errors = FieldErrors::new();
        errors.add("category", e.to_string());
        ApiError::fields(errors)
    })?;

    let content = state
        .course_service
        .content(&user.0, id, &query.search, category)
        .await?;
    Ok(Json(content))
}

/// GET /api/v1/courses/{id}/stats
async fn stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseStats>, ApiError> {
    let stats = state.course_service.stats(&user.0, id).await?;
    Ok(Json(stats))
}

/// POST /api/v1/courses/{id}/files
///
/// Accepts multipart/form-data with a single file field named "file".
async fn upload_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileMetadata>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mime_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        let metadata = state
            .storage_service
            .upload(
                &user.0,
                id,
                UploadInput {
                    original_name,
                    mime_type,
                    bytes: bytes.to_vec(),
                },
            )
            .await?;
        return Ok((StatusCode::CREATED, Json(metadata)));
    }

    let mut errors = FieldErrors::new();
    errors.add("file", "No file provided");
    Err(ApiError::fields(errors))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_catalog_filters_by_category_and_hides_drafts() {
        let app = TestApp::new().await;
        let admin = app.register("admin@example.com").await;
        let tutor = app.instructor("tutor@example.com").await;
        app.create_course(&tutor, "Rust", "programming", 100, true).await;
        app.create_course(&tutor, "Drawing", "art", 50, true).await;
        app.create_course(&tutor, "Secret", "programming", 10, false).await;

        let response = app.get("/api/v1/courses", Some(&admin)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.as_array().unwrap().len(), 2);

        let response = app
            .get("/api/v1/courses?category=programming", Some(&admin))
            .await;
        let titles: Vec<&str> = response
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Rust"]);
    }

    #[tokio::test]
    async fn test_enroll_then_duplicate_conflicts() {
        let app = TestApp::new().await;
        app.register("admin@example.com").await;
        let tutor = app.instructor("tutor@example.com").await;
        let student = app.register("student@example.com").await;
        let course_id = app.create_course(&tutor, "Rust", "programming", 100, true).await;

        let uri = format!("/api/v1/courses/{}/enroll", course_id);
        let response = app.post_json(&uri, Some(&student), json!({})).await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.body["courseId"], course_id);

        let response = app.post_json(&uri, Some(&student), json!({})).await;
        assert_eq!(response.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_content_reports_enrollment_and_filters_files() {
        let app = TestApp::new().await;
        app.register("admin@example.com").await;
        let tutor = app.instructor("tutor@example.com").await;
        let student = app.register("student@example.com").await;
        let course_id = app.create_course(&tutor, "Rust", "programming", 100, true).await;
        app.upload(&tutor, course_id, "intro.mp4", "video/mp4").await;
        app.upload(&tutor, course_id, "Report.pdf", "application/pdf").await;

        let uri = format!("/api/v1/courses/{}/content?category=videos", course_id);
        let response = app.get(&uri, Some(&student)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["userEnrolled"], false);
        assert_eq!(response.body["files"].as_array().unwrap().len(), 1);
        assert_eq!(response.body["files"][0]["originalName"], "intro.mp4");

        let uri = format!("/api/v1/courses/{}/content?search=report", course_id);
        let response = app.get(&uri, Some(&student)).await;
        assert_eq!(response.body["files"][0]["fileType"], "pdf");

        let uri = format!("/api/v1/courses/{}/content?category=audio", course_id);
        let response = app.get(&uri, Some(&student)).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_rejects_disallowed_type_and_non_owner() {
        let app = TestApp::new().await;
        app.register("admin@example.com").await;
        let tutor = app.instructor("tutor@example.com").await;
        let student = app.register("student@example.com").await;
        let course_id = app.create_course(&tutor, "Rust", "programming", 100, true).await;

        let response = app
            .upload_raw(&tutor, course_id, "run.exe", "application/x-msdownload")
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(response.body["error"]["details"]["fields"]["file"].is_string());

        let response = app
            .upload_raw(&student, course_id, "notes.pdf", "application/pdf")
            .await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_stats_for_owner_only() {
        let app = TestApp::new().await;
        app.register("admin@example.com").await;
        let tutor = app.instructor("tutor@example.com").await;
        let student = app.register("student@example.com").await;
        let course_id = app.create_course(&tutor, "Rust", "programming", 150, true).await;
        app.post_json(
            &format!("/api/v1/courses/{}/enroll", course_id),
            Some(&student),
            json!({}),
        )
        .await;

        let uri = format!("/api/v1/courses/{}/stats", course_id);
        let response = app.get(&uri, Some(&tutor)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["enrollmentCount"], 1);
        assert_eq!(response.body["revenue"], 150);

        let response = app.get(&uri, Some(&student)).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }
}
