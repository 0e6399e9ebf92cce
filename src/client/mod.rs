//! Typed client for the coursehub backend
//!
//! - `backend`: environment configuration and the shared HTTP client
//! - `auth`: session/auth adapter and the observable auth store
//! - `documents`: collection queries and course helpers
//! - `loaders`: view loads feeding the derived view-state builders
//! - `scope`: cancellation for loads whose consumer went away

pub mod auth;
pub mod backend;
pub mod documents;
pub mod error;
pub mod loaders;
pub mod scope;

pub use auth::{AuthAdapter, AuthOutcome, AuthState, AuthStore, SessionUser};
pub use backend::{BackendClient, BackendConfig};
pub use documents::{DocumentClient, Filters};
pub use error::ClientError;
pub use loaders::{load_catalog, load_course_page, load_instructor_stats, load_into, LoadState};
pub use scope::TaskScope;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::TestApp;
    use crate::models::{CreateCourseInput, UserRole};
    use crate::views::ContentCategory;

    /// Serve a fresh app on an ephemeral port and point a client at it
    async fn serve() -> (TestApp, BackendClient) {
        let app = TestApp::new().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let client =
            BackendClient::new(BackendConfig::with_endpoint(format!("http://{}", addr))).unwrap();
        (app, client)
    }

    fn course(title: &str, category: &str, price: i64, published: bool) -> CreateCourseInput {
        serde_json::from_value(serde_json::json!({
            "title": title,
            "description": "",
            "price": price,
            "category": category,
            "isPublished": published
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_login_logout_round() {
        let (_app, client) = serve().await;
        let adapter = AuthAdapter::new(client);
        let mut rx = adapter.subscribe();

        let outcome = adapter
            .register("owner@example.com", "Secret123", "Secret123", "Owner")
            .await;
        assert!(outcome.success, "{:?}", outcome.error);
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(state.is_authenticated);
        assert!(state.is_instructor);
        assert_eq!(state.user_profile.unwrap().role, UserRole::Admin);

        assert!(adapter.logout().await.success);
        assert!(!adapter.store().snapshot().is_authenticated);
        assert!(adapter.logout().await.success);

        let outcome = adapter.login("owner@example.com", "WrongPass").await;
        assert_eq!(outcome.error, Some(ClientError::InvalidCredentials));
        assert_eq!(outcome.message().unwrap(), "Invalid email or password.");

        let outcome = adapter.login("owner@example.com", "Secret123").await;
        assert!(outcome.success);
        assert_eq!(
            adapter.store().snapshot().user.unwrap().email,
            "owner@example.com"
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_reported() {
        let (_app, client) = serve().await;
        let adapter = AuthAdapter::new(client.clone());
        assert!(adapter
            .register("x@example.com", "Secret123", "Secret123", "X")
            .await
            .success);

        let other = AuthAdapter::new(BackendClient::new(client.config().clone()).unwrap());
        let outcome = other
            .register("x@example.com", "Secret123", "Secret123", "X")
            .await;
        assert!(matches!(outcome.error, Some(ClientError::DuplicateAccount(_))));
    }

    #[tokio::test]
    async fn test_dashboard_and_course_page_loads() {
        let (app, client) = serve().await;
        let config = client.config().clone();

        // Admin first, then an instructor and a student.
        let admin = AuthAdapter::new(client);
        assert!(admin.register("admin@example.com", "Secret123", "Secret123", "Admin").await.success);

        let tutor_token = app.instructor("tutor@example.com").await;
        let tutor_client = BackendClient::new(config.clone()).unwrap();
        tutor_client.set_token(Some(tutor_token));
        let tutor = AuthAdapter::new(tutor_client.clone());
        let tutor_state = tutor.refresh().await.unwrap();
        assert!(tutor_state.is_instructor);
        let tutor_profile = tutor_state.user_profile.unwrap();

        let tutor_docs = DocumentClient::new(tutor_client);
        let published = tutor_docs
            .create_course(&course("Rust", "programming", 100, true))
            .await
            .unwrap();
        tutor_docs
            .create_course(&course("Draft", "programming", 50, false))
            .await
            .unwrap();
        app.upload(
            &tutor.client().token().unwrap(),
            published.id,
            "Lecture.mp4",
            "video/mp4",
        )
        .await;

        let student_client = BackendClient::new(config).unwrap();
        let student = AuthAdapter::new(student_client.clone());
        assert!(student.register("student@example.com", "Secret123", "Secret123", "Student").await.success);
        let student_docs = DocumentClient::new(student_client);
        let student_id = student.store().snapshot().user.unwrap().id;

        let page = load_course_page(&student_docs, student_id, published.id, "", ContentCategory::Videos)
            .await
            .unwrap();
        assert!(!page.user_enrolled);
        assert_eq!(page.files.len(), 1);
        let err = student_docs
            .page_download_reference(&page, student_id, &page.files[0])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied(_)));

        student_docs.enroll(published.id).await.unwrap();
        let err = student_docs.enroll(published.id).await.unwrap_err();
        assert!(matches!(err, ClientError::Conflict(_)));

        let page = load_course_page(&student_docs, student_id, published.id, "lecture", ContentCategory::All)
            .await
            .unwrap();
        assert!(page.user_enrolled);

        let file = &page.files[0];
        let reference = student_docs
            .page_download_reference(&page, student_id, file)
            .await
            .unwrap();
        assert_eq!(reference.file_name, "Lecture.mp4");

        let catalog = load_catalog(&student_docs, &["programming".to_string()]).await.unwrap();
        assert_eq!(catalog.len(), 1);

        let scope = TaskScope::new();
        let docs = tutor_docs.clone();
        let mut rx = load_into(&scope, async move {
            load_instructor_stats(&docs, &tutor_profile).await
        });
        rx.changed().await.unwrap();
        let stats = match rx.borrow().clone() {
            LoadState::Ready(stats) => stats,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(stats.total_courses, 2);
        assert_eq!(stats.published_courses, 1);
        assert_eq!(stats.draft_courses, 1);
        assert_eq!(stats.total_enrollments, 1);
        assert_eq!(stats.total_revenue, 100);
        assert_eq!(tutor_docs.dashboard_stats().await.unwrap(), stats);

        let err = load_instructor_stats(&student_docs, &student.store().snapshot().user_profile.unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied(_)));
    }
}
