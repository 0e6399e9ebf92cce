//! API layer - HTTP handlers and routing
//!
//! - Auth endpoints (register, login, logout, session, profile)
//! - Collection-addressed document endpoints
//! - Course endpoints (catalog, checkout, content, stats, uploads)
//! - File store endpoints (download references and bytes)
//! - Instructor dashboard
//! - Route guard in front of the static site

pub mod auth;
pub mod courses;
pub mod dashboard;
pub mod documents;
pub mod guard;
pub mod middleware;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub use guard::{GuardDecision, RouteGuard};
pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let max_upload = usize::try_from(state.config.storage.max_file_size).unwrap_or(usize::MAX);

    // Protected routes (need a session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/collections", documents::router())
        .nest("/courses", courses::router(max_upload))
        .nest("/storage", storage::router())
        .nest("/dashboard", dashboard::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
        .fallback(|| async { ApiError::not_found("Route not found") })
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_project_id,
        ))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = match state.config.server.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::COOKIE,
                HeaderName::from_static(middleware::PROJECT_ID_HEADER),
            ])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!(
                origin = %state.config.server.cors_origin,
                "Invalid CORS origin, cross-origin requests are disabled"
            );
            CorsLayer::new()
        }
    };

    let static_dir = &state.config.site.static_dir;
    let site = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));
    let pages = Router::new()
        .fallback_service(site)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            guard::route_guard,
        ));

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .route("/health", get(health))
        .merge(pages)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
