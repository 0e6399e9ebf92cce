//! Instructor dashboard endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::views::InstructorStats;

/// Build the dashboard router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(stats))
}

/// GET /api/v1/dashboard/stats
async fn stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<InstructorStats>, ApiError> {
    let stats = state.course_service.dashboard(&user.0).await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_dashboard_totals_for_instructor() {
        let app = TestApp::new().await;
        let admin = app.register("admin@example.com").await;
        let tutor = app.instructor("tutor@example.com").await;
        let other = app.instructor("other@example.com").await;
        let student = app.register("student@example.com").await;

        let published = app.create_course(&tutor, "Rust", "programming", 100, true).await;
        app.create_course(&tutor, "Draft", "programming", 50, false).await;
        let foreign = app.create_course(&other, "Art", "art", 70, true).await;

        for course_id in [published, foreign] {
            let response = app
                .post_json(
                    &format!("/api/v1/courses/{}/enroll", course_id),
                    Some(&student),
                    json!({}),
                )
                .await;
            assert_eq!(response.status, StatusCode::CREATED);
        }

        let response = app.get("/api/v1/dashboard/stats", Some(&tutor)).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["totalCourses"], 2);
        assert_eq!(response.body["publishedCourses"], 1);
        assert_eq!(response.body["draftCourses"], 1);
        assert_eq!(response.body["totalEnrollments"], 1);
        assert_eq!(response.body["totalRevenue"], 100);

        let response = app.get("/api/v1/dashboard/stats", Some(&admin)).await;
        assert_eq!(response.body["totalCourses"], 3);
        assert_eq!(response.body["totalRevenue"], 170);

        let response = app.get("/api/v1/dashboard/stats", Some(&student)).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }
}
