//! Client error taxonomy

use reqwest::StatusCode;

use crate::api::ApiError;
use crate::validation::FieldErrors;

/// Everything a backend call can fail with
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// A required environment value is missing
    #[error("Backend is not configured: {0} is not set")]
    NotConfigured(&'static str),

    /// Field-scoped rejection, from the local pre-check or the server
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    /// No session, or the session expired
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request never got an answer
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with something unexpected
    #[error("Server error: {0}")]
    Server(String),
}

impl ClientError {
    /// Build from a non-success response and its decoded error body
    pub fn from_response(status: StatusCode, body: Option<ApiError>) -> Self {
        let Some(body) = body else {
            return ClientError::Server(format!("Unexpected response status {}", status));
        };
        let detail = body.error;

        match detail.code.as_str() {
            "VALIDATION_ERROR" => {
                let fields = detail
                    .details
                    .and_then(|d| d.get("fields").cloned())
                    .and_then(|f| serde_json::from_value::<FieldErrors>(f).ok())
                    .filter(|f| !f.is_empty())
                    .unwrap_or_else(|| {
                        let mut errors = FieldErrors::new();
                        errors.add("form", detail.message.clone());
                        errors
                    });
                ClientError::Validation(fields)
            }
            "INVALID_CREDENTIALS" => ClientError::InvalidCredentials,
            "DUPLICATE_ACCOUNT" => ClientError::DuplicateAccount(detail.message),
            "UNAUTHORIZED" => ClientError::Unauthenticated,
            "NOT_FOUND" => ClientError::NotFound(detail.message),
            "FORBIDDEN" => ClientError::PermissionDenied(detail.message),
            "CONFLICT" => ClientError::Conflict(detail.message),
            _ => ClientError::Server(detail.message),
        }
    }

    /// Text for a toast or form banner
    pub fn user_message(&self) -> String {
        match self {
            ClientError::NotConfigured(_) => {
                "The service is not configured yet. Please try again later.".to_string()
            }
            ClientError::Validation(errors) => errors
                .first_message()
                .unwrap_or("Please check the highlighted fields.")
                .to_string(),
            ClientError::InvalidCredentials => "Invalid email or password.".to_string(),
            ClientError::DuplicateAccount(_) => {
                "An account with this email already exists.".to_string()
            }
            ClientError::Unauthenticated => "Please sign in to continue.".to_string(),
            ClientError::NotFound(_) => "The requested item could not be found.".to_string(),
            ClientError::PermissionDenied(_) => {
                "You do not have permission to do that.".to_string()
            }
            ClientError::Conflict(message) => message.clone(),
            ClientError::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ClientError::Server(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Server(format!("Malformed response: {}", err))
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
