//! Session/auth adapter
//!
//! [`AuthAdapter`] wraps the auth endpoints and owns an [`AuthStore`], the
//! single source of the signed-in state. Views subscribe to the store; only
//! adapter methods write to it.

use serde::Serialize;
use tokio::sync::watch;

use super::backend::BackendClient;
use super::error::ClientError;
use crate::api::auth::{AuthResponse, SessionResponse};
use crate::models::UserProfile;
use crate::validation::{validate_login, validate_registration};

/// Identity behind the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
}

/// What the rest of the client knows about the signed-in user
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<SessionUser>,
    pub user_profile: Option<UserProfile>,
    pub is_authenticated: bool,
    pub is_instructor: bool,
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            user_profile: None,
            is_authenticated: false,
            is_instructor: false,
            loading: true,
        }
    }
}

impl AuthState {
    /// Settled state for `profile` (signed out when `None`)
    pub fn from_profile(profile: Option<UserProfile>) -> Self {
        Self {
            user: profile.as_ref().map(|p| SessionUser {
                id: p.id,
                email: p.email.clone(),
            }),
            is_authenticated: profile.is_some(),
            is_instructor: profile.as_ref().is_some_and(|p| p.role.is_instructor()),
            user_profile: profile,
            loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self::from_profile(None)
    }
}

/// Observable auth state
#[derive(Debug, Clone)]
pub struct AuthStore {
    tx: watch::Sender<AuthState>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    fn set(&self, state: AuthState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn set_loading(&self, loading: bool) {
        self.tx.send_if_modified(|current| {
            let changed = current.loading != loading;
            current.loading = loading;
            changed
        });
    }
}

/// Result of an auth action as shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub success: bool,
    pub error: Option<ClientError>,
}

impl AuthOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: ClientError) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    /// Banner text for a failed action
    pub fn message(&self) -> Option<String> {
        self.error.as_ref().map(ClientError::user_message)
    }
}

impl From<Result<(), ClientError>> for AuthOutcome {
    fn from(result: Result<(), ClientError>) -> Self {
        match result {
            Ok(()) => AuthOutcome::ok(),
            Err(e) => AuthOutcome::failed(e),
        }
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    email: &'a str,
    password: &'a str,
    confirm_password: &'a str,
    full_name: &'a str,
}

/// Login, registration, logout and who-am-I on top of [`BackendClient`]
#[derive(Debug, Clone)]
pub struct AuthAdapter {
    client: BackendClient,
    store: AuthStore,
}

impl AuthAdapter {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            store: AuthStore::new(),
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn store(&self) -> &AuthStore {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.store.subscribe()
    }

    /// Ask the backend who is signed in and publish the answer
    pub async fn refresh(&self) -> Result<AuthState, ClientError> {
        if self.client.token().is_none() {
            let state = AuthState::signed_out();
            self.store.set(state.clone());
            return Ok(state);
        }

        self.store.set_loading(true);
        let session: Result<SessionResponse, ClientError> = self.client.get("/auth/session").await;
        match session {
            Ok(session) => {
                if !session.is_authenticated {
                    self.client.set_token(None);
                }
                let state = AuthState::from_profile(session.user);
                self.store.set(state.clone());
                Ok(state)
            }
            Err(e) => {
                self.store.set_loading(false);
                Err(e)
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        let result = self.try_login(email, password).await;
        if let Err(e) = &result {
            tracing::warn!("Login failed: {}", e);
        }
        result.into()
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        validate_login(email, password)
            .into_result()
            .map_err(ClientError::Validation)?;

        let response: AuthResponse = self
            .client
            .post("/auth/login", &LoginBody { email, password })
            .await?;
        self.establish(response).await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
        full_name: &str,
    ) -> AuthOutcome {
        let result = self
            .try_register(email, password, confirm_password, full_name)
            .await;
        if let Err(e) = &result {
            tracing::warn!("Registration failed: {}", e);
        }
        result.into()
    }

    async fn try_register(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
        full_name: &str,
    ) -> Result<(), ClientError> {
        validate_registration(email, password, confirm_password, full_name)
            .into_result()
            .map_err(ClientError::Validation)?;

        let body = RegisterBody {
            email,
            password,
            confirm_password,
            full_name,
        };
        let response: AuthResponse = self.client.post("/auth/register", &body).await?;
        self.establish(response).await
    }

    /// Keep the new token, then confirm the session before reporting success
    async fn establish(&self, response: AuthResponse) -> Result<(), ClientError> {
        self.client.set_token(Some(response.token));
        let state = self.refresh().await?;
        if !state.is_authenticated {
            return Err(ClientError::Unauthenticated);
        }
        tracing::info!(user_id = response.user.id, "Signed in");
        Ok(())
    }

    /// Sign out. Without a session this does nothing.
    pub async fn logout(&self) -> AuthOutcome {
        if self.client.token().is_none() {
            self.store.set(AuthState::signed_out());
            return AuthOutcome::ok();
        }

        let result = match self.client.request(reqwest::Method::POST, "/auth/logout") {
            Ok(request) => self.client.send_empty(request).await,
            Err(e) => Err(e),
        };
        self.client.set_token(None);
        self.store.set(AuthState::signed_out());

        if let Err(e) = &result {
            tracing::warn!("Logout failed: {}", e);
        }
        result.into()
    }
}
