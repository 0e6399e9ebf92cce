//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error type every handler returns
//! - Session token extraction and the `require_auth` middleware
//! - The project id check applied to every API request

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::guard::RouteGuard;
use crate::config::Config;
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    AuthService, AuthServiceError, CourseService, DocumentService, DocumentServiceError, Services,
    StorageService,
};
use crate::validation::FieldErrors;

/// Header carrying the client's project id
pub const PROJECT_ID_HEADER: &str = "x-project-id";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub auth_service: Arc<AuthService>,
    pub course_service: Arc<CourseService>,
    pub storage_service: Arc<StorageService>,
    pub document_service: Arc<DocumentService>,
    pub guard: Arc<RouteGuard>,
}

impl AppState {
    /// Wire every service to `pool`
    pub fn new(pool: DynDatabasePool, config: Config) -> Self {
        let services = Services::new(pool.clone(), &config);
        let guard = Arc::new(RouteGuard::new(&config.guard));
        Self {
            pool,
            config: Arc::new(config),
            auth_service: services.auth,
            course_service: services.courses,
            storage_service: services.storage,
            document_service: services.documents,
            guard,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Validation failure carrying per-field messages in `details.fields`
    pub fn fields(errors: FieldErrors) -> Self {
        let message = errors
            .first_message()
            .unwrap_or("Validation failed")
            .to_string();
        Self::with_details(
            "VALIDATION_ERROR",
            message,
            serde_json::json!({ "fields": errors }),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" | "INVALID_CREDENTIALS" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" | "DUPLICATE_ACCOUNT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::Validation(errors) => ApiError::fields(errors),
            AuthServiceError::InvalidCredentials => {
                ApiError::new("INVALID_CREDENTIALS", "Invalid email or password")
            }
            AuthServiceError::DuplicateAccount(msg) => ApiError::new("DUPLICATE_ACCOUNT", msg),
            AuthServiceError::UserNotFound => ApiError::not_found("User not found"),
            AuthServiceError::InternalError(e) => {
                tracing::error!("Auth service failure: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<DocumentServiceError> for ApiError {
    fn from(err: DocumentServiceError) -> Self {
        match err {
            DocumentServiceError::NotFound(msg) => ApiError::not_found(msg),
            DocumentServiceError::PermissionDenied(msg) => ApiError::forbidden(msg),
            DocumentServiceError::Validation(errors) => ApiError::fields(errors),
            DocumentServiceError::Conflict(msg) => ApiError::conflict(msg),
            DocumentServiceError::InternalError(e) => {
                tracing::error!("Document service failure: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Value of cookie `name`
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(str::trim)
        .find_map(|c| c.strip_prefix(prefix.as_str()))
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Session token from `Authorization: Bearer` or the session cookie
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    cookie_value(headers, cookie_name)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers(), &state.config.session.cookie_name)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .auth_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Reject API requests whose `X-Project-Id` does not match the configured
/// project. Passes everything through when no project id is configured.
pub async fn require_project_id(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.config.server.project_id.as_deref() {
        let presented = request
            .headers()
            .get(PROJECT_ID_HEADER)
            .and_then(|h| h.to_str().ok());
        if presented != Some(expected) {
            tracing::warn!(path = %request.uri().path(), "Rejected request with wrong project id");
            return Err(ApiError::forbidden("Unknown project"));
        }
    }
    Ok(next.run(request).await)
}

/// Headers carrying a `Set-Cookie` value
pub fn set_cookie(cookie: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!("Invalid Set-Cookie value: {}", e),
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=def"));
        assert_eq!(extract_session_token(&headers, "token").as_deref(), Some("abc"));
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=def; other=1"),
        );
        assert_eq!(extract_session_token(&headers, "token").as_deref(), Some("def"));
        assert_eq!(extract_session_token(&headers, "session"), None);
    }

    #[test]
    fn test_empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert_eq!(cookie_value(&headers, "token"), None);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::internal_error("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_field_errors_travel_in_details() {
        let mut errors = FieldErrors::new();
        errors.add("email", "Please enter a valid email address");
        let err = ApiError::from(DocumentServiceError::Validation(errors));

        assert_eq!(err.error.code, "VALIDATION_ERROR");
        assert_eq!(err.error.message, "Please enter a valid email address");
        let details = err.error.details.unwrap();
        assert_eq!(
            details["fields"]["email"],
            "Please enter a valid email address"
        );
    }

    #[test]
    fn test_auth_errors_map_to_codes() {
        let err = ApiError::from(AuthServiceError::InvalidCredentials);
        assert_eq!(err.error.code, "INVALID_CREDENTIALS");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = ApiError::from(AuthServiceError::DuplicateAccount("taken".into()));
        assert_eq!(err.error.code, "DUPLICATE_ACCOUNT");
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
