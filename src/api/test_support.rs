//! Router harness for API tests: an in-memory database, a temporary file
//! store and static site, and helpers that drive the router with `oneshot`.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use super::{build_router, AppState};
use crate::config::Config;
use crate::db::repositories::{SqlxUserRepository, UserRepository};
use crate::db::{create_test_pool, migrations};
use crate::models::UserRole;

const BOUNDARY: &str = "coursehub-test-boundary";

pub(crate) struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub(crate) struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let site = dir.path().join("site");
        std::fs::create_dir_all(&site).expect("Failed to create site dir");
        std::fs::write(site.join("index.html"), "<html>coursehub</html>")
            .expect("Failed to write index.html");

        let mut config = Config::default();
        config.storage.path = dir.path().join("storage");
        config.site.static_dir = site;
        customize(&mut config);

        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let state = AppState::new(pool, config);
        Self {
            router: build_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body")
            .to_vec();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
            bytes,
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Self::request("GET", uri, token).body(Body::empty()).unwrap())
            .await
    }

    /// Page navigation carrying the session cookie instead of a bearer token
    pub async fn get_page(&self, uri: &str, cookie_token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = cookie_token {
            builder = builder.header(header::COOKIE, format!("token={}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(
            Self::request("POST", uri, token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(
            Self::request("PUT", uri, token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Self::request("DELETE", uri, token).body(Body::empty()).unwrap())
            .await
    }

    /// Register an account and return its session token
    pub async fn register(&self, email: &str) -> String {
        let response = self
            .post_json(
                "/api/v1/auth/register",
                None,
                json!({
                    "email": email,
                    "password": "Secret123",
                    "confirmPassword": "Secret123",
                    "fullName": "Test User"
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["token"].as_str().unwrap().to_string()
    }

    /// Register an account with the instructor role
    pub async fn instructor(&self, email: &str) -> String {
        let token = self.register(email).await;
        let mut user = self
            .state
            .auth_service
            .validate_session(&token)
            .await
            .unwrap()
            .unwrap();
        user.role = UserRole::Instructor;
        SqlxUserRepository::new(self.state.pool.clone())
            .update(&user)
            .await
            .unwrap();
        token
    }

    pub async fn create_course(
        &self,
        token: &str,
        title: &str,
        category: &str,
        price: i64,
        published: bool,
    ) -> i64 {
        let response = self
            .post_json(
                "/api/v1/collections/courses/documents",
                Some(token),
                json!({
                    "title": title,
                    "description": format!("All about {}", title),
                    "price": price,
                    "category": category,
                    "isPublished": published
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_i64().unwrap()
    }

    pub async fn upload_raw(&self, token: &str, course_id: i64, name: &str, mime: &str) -> TestResponse {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: {mime}\r\n\r\ncontents of {name}\r\n--{b}--\r\n",
            b = BOUNDARY,
            name = name,
            mime = mime
        );
        self.send(
            Self::request("POST", &format!("/api/v1/courses/{}/files", course_id), Some(token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Upload a small file and return its metadata
    pub async fn upload(&self, token: &str, course_id: i64, name: &str, mime: &str) -> Value {
        let response = self.upload_raw(token, course_id, name, mime).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }
}
