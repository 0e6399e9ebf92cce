//! Route guard for page navigations
//!
//! Runs ahead of the static site. Protected paths need a live session,
//! auth-only paths (login, signup) need the absence of one. The session
//! cookie is checked against the session store, so a stale or forged cookie
//! counts as no session and is cleared.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::middleware::{cookie_value, AppState};
use crate::config::GuardConfig;

/// Where unauthenticated visitors of protected pages are sent
pub const LOGIN_PATH: &str = "/auth/login";

/// Where signed-in visitors of auth-only pages are sent
pub const HOME_PATH: &str = "/";

/// Outcome of a navigation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPattern {
    Exact(String),
    /// The path itself and everything below it
    Subtree(String),
}

impl PathPattern {
    fn parse(raw: &str) -> Self {
        match raw.strip_suffix('*') {
            Some(prefix) => PathPattern::Subtree(normalize(prefix).to_string()),
            None => PathPattern::Exact(normalize(raw).to_string()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == p,
            PathPattern::Subtree(p) => {
                p == "/"
                    || path == p
                    || path
                        .strip_prefix(p.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Per-navigation redirect policy
#[derive(Debug, Clone)]
pub struct RouteGuard {
    protected: Vec<PathPattern>,
    auth_only: Vec<PathPattern>,
}

impl RouteGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            protected: config.protected.iter().map(|p| PathPattern::parse(p)).collect(),
            auth_only: config.auth_only.iter().map(|p| PathPattern::parse(p)).collect(),
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        let path = normalize(path);
        self.protected.iter().any(|p| p.matches(path))
    }

    pub fn is_auth_only(&self, path: &str) -> bool {
        let path = normalize(path);
        self.auth_only.iter().any(|p| p.matches(path))
    }

    /// Whether the decision for `path` depends on the session at all
    pub fn is_guarded(&self, path: &str) -> bool {
        self.is_protected(path) || self.is_auth_only(path)
    }

    pub fn decide(&self, path: &str, has_session: bool) -> GuardDecision {
        if self.is_protected(path) && !has_session {
            GuardDecision::Redirect(LOGIN_PATH)
        } else if self.is_auth_only(path) && has_session {
            GuardDecision::Redirect(HOME_PATH)
        } else {
            GuardDecision::Pass
        }
    }
}

/// Guard middleware for the static site
pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if path.starts_with("/api/") || !state.guard.is_guarded(&path) {
        return next.run(request).await;
    }

    let cookie_name = &state.config.session.cookie_name;
    let token = cookie_value(request.headers(), cookie_name);
    let has_session = match token.as_deref() {
        Some(token) => match state.auth_service.validate_session(token).await {
            Ok(user) => user.is_some(),
            Err(e) => {
                tracing::warn!("Session check failed in route guard: {}", e);
                false
            }
        },
        None => false,
    };
    let stale_cookie = token.is_some() && !has_session;

    let decision = state.guard.decide(&path, has_session);
    tracing::debug!(path = %path, has_session, ?decision, "Route guard");

    let mut response = match decision {
        GuardDecision::Pass => next.run(request).await,
        GuardDecision::Redirect(location) => (
            StatusCode::TEMPORARY_REDIRECT,
            [(header::LOCATION, HeaderValue::from_static(location))],
        )
            .into_response(),
    };

    if stale_cookie {
        if let Ok(value) = HeaderValue::from_str(&state.config.session.clear_cookie()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}
