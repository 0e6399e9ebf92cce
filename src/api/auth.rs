//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Create an account and sign in
//! - POST /api/v1/auth/login - Sign in
//! - POST /api/v1/auth/logout - Sign out (idempotent)
//! - GET /api/v1/auth/session - Who am I
//! - PUT /api/v1/auth/profile - Edit own profile

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{
    extract_session_token, set_cookie, ApiError, AppState, AuthenticatedUser,
};
use crate::models::UserProfile;
use crate::services::{LoginInput, ProfileInput, RegisterInput, SignedIn};

/// Response for successful authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

impl From<SignedIn> for AuthResponse {
    fn from(signed_in: SignedIn) -> Self {
        Self {
            user: signed_in.user.profile(),
            token: signed_in.session.id,
        }
    }
}

/// Current session as seen by the client
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub is_authenticated: bool,
    pub user: Option<UserProfile>,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/profile", put(update_profile))
}

/// POST /api/v1/auth/register
///
/// The first account becomes the admin.
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let signed_in = state.auth_service.register(body).await?;
    let cookie = state.config.session.session_cookie(&signed_in.session.id);

    Ok((
        StatusCode::CREATED,
        set_cookie(&cookie),
        Json(AuthResponse::from(signed_in)),
    ))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let signed_in = state.auth_service.login(body).await?;
    tracing::info!(user_id = signed_in.user.id, "User logged in");
    let cookie = state.config.session.session_cookie(&signed_in.session.id);

    Ok((set_cookie(&cookie), Json(AuthResponse::from(signed_in))))
}

/// POST /api/v1/auth/logout
///
/// Always answers 204 and clears the cookie, with or without a session.
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers, &state.config.session.cookie_name) {
        state.auth_service.logout(&token).await?;
    }

    let cookie = state.config.session.clear_cookie();
    Ok((StatusCode::NO_CONTENT, set_cookie(&cookie)))
}

/// GET /api/v1/auth/session
async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = match extract_session_token(&headers, &state.config.session.cookie_name) {
        Some(token) => state.auth_service.validate_session(&token).await?,
        None => None,
    };

    Ok(Json(SessionResponse {
        is_authenticated: user.is_some(),
        user: user.map(|u| u.profile()),
    }))
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ProfileInput>,
) -> Result<Json<UserProfile>, ApiError> {
    let updated = state.auth_service.update_profile(user.0.id, body).await?;
    Ok(Json(updated.profile()))
}
