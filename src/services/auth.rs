//! Identity provider
//!
//! Registration (the first account becomes admin), login/logout, session
//! validation and own-profile edits. Sessions are opaque UUID tokens stored
//! server-side; an expired session is treated as absent and removed.

use crate::db::is_unique_violation;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::validation::{validate_login, validate_registration, FieldErrors};
use anyhow::Context;
use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default session lifetime in days
pub const DEFAULT_SESSION_LIFETIME_DAYS: i64 = 7;

/// Error types for identity operations
#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// One or more form fields broke the validation policy
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Email already registered
    #[error("An account with email '{0}' already exists")]
    DuplicateAccount(String),

    /// User record not found
    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A user together with the session just issued for them
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub session: Session,
}

/// Registration form
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
}

impl RegisterInput {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            confirm_password: confirm_password.into(),
            full_name: full_name.into(),
        }
    }
}

/// Login form
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Own-profile edit
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileInput {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

/// Identity service
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime: Duration,
    /// Serializes the first-user check with the insert that follows it
    registration: Mutex<()>,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_lifetime(user_repo, session_repo, DEFAULT_SESSION_LIFETIME_DAYS)
    }

    pub fn with_session_lifetime(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        lifetime_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_lifetime: Duration::days(lifetime_days),
            registration: Mutex::new(()),
        }
    }

    /// Register a new account and sign it in.
    ///
    /// The first account ever registered is an admin; all others are regular.
    /// Registrations within this process are serialized so that concurrent
    /// sign-ups on an empty store yield exactly one admin.
    ///
    /// # Errors
    ///
    /// - `Validation` when the form breaks the policy
    /// - `DuplicateAccount` when the email is taken
    pub async fn register(&self, input: RegisterInput) -> Result<SignedIn, AuthServiceError> {
        validate_registration(
            &input.email,
            &input.password,
            &input.confirm_password,
            &input.full_name,
        )
        .into_result()
        .map_err(AuthServiceError::Validation)?;

        let email = normalize_email(&input.email);
        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let registering = self.registration.lock().await;
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AuthServiceError::DuplicateAccount(email));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Regular
        };

        let user = User::new(
            email.clone(),
            password_hash,
            input.full_name.trim().to_string(),
            role,
        );

        let user = match self.user_repo.create(&user).await {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => {
                return Err(AuthServiceError::DuplicateAccount(email))
            }
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        drop(registering);

        tracing::info!(user_id = user.id, role = %user.role, "Registered new account");
        let session = self.create_session(user.id).await?;
        Ok(SignedIn { user, session })
    }

    /// Check credentials and issue a session.
    pub async fn login(&self, input: LoginInput) -> Result<SignedIn, AuthServiceError> {
        validate_login(&input.email, &input.password)
            .into_result()
            .map_err(AuthServiceError::Validation)?;

        let user = self
            .user_repo
            .get_by_email(&normalize_email(&input.email))
            .await
            .context("Failed to get user by email")?
            .ok_or(AuthServiceError::InvalidCredentials)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            return Err(AuthServiceError::InvalidCredentials);
        }

        let session = self.create_session(user.id).await?;
        Ok(SignedIn { user, session })
    }

    /// Invalidate a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AuthServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a live session, `None` when the token is unknown or
    /// expired.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, AuthServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to remove expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, AuthServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    /// Update the caller's own name, avatar and bio
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: ProfileInput,
    ) -> Result<User, AuthServiceError> {
        let mut user = self
            .get_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        if let Some(name) = input.name {
            if name.trim().is_empty() {
                let mut errors = FieldErrors::new();
                errors.add("name", "Name cannot be empty");
                return Err(AuthServiceError::Validation(errors));
            }
            user.full_name = name.trim().to_string();
        }
        if let Some(avatar) = input.avatar {
            user.avatar = non_blank(avatar);
        }
        if let Some(bio) = input.bio {
            user.bio = non_blank(bio);
        }

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;
        Ok(updated)
    }

    /// True when no account exists yet
    pub async fn is_first_user(&self) -> Result<bool, AuthServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AuthServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, AuthServiceError> {
        let session = Session::issue(user_id, self.session_lifetime);
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
