//! Error taxonomy for backend API calls.

use reqwest::StatusCode;
use thiserror::Error;

/// Fallback message when a failed response carries no `message` field.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// Failure of a backend request.
///
/// Only two real classes exist: the server answered with a non-success
/// status (`Http`), or something unexpected happened on the way
/// (`Network`, `Decode`).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success status with the server's message.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// Transport failure (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Success status but the body was not what we expected.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// A 401 means the session is gone; callers treat it as logged out.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Message to show the user, or `fallback` for non-HTTP failures.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Http { message, .. } => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
