use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::RefreshError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure. Credentials are left alone; the caller may retry.
    #[error("Network error: {0}")]
    Network(String),

    /// The session could not be renewed and has been cleared
    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Any non-auth HTTP failure, passed through untouched
    #[error("Request failed ({status}): {body}")]
    RequestFailed { status: StatusCode, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::RequestFailed {
            status,
            body: Self::truncate_body(body),
        }
    }

    /// Status code of a passed-through HTTP failure
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transient failures the UI can offer to retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Short message suitable for showing to the player
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => "Network error. Check your connection and try again.".to_string(),
            ApiError::SessionExpired => "Your session has expired. Please log in again.".to_string(),
            ApiError::InvalidCredentials => "Invalid username or password.".to_string(),
            ApiError::RequestFailed { status, .. } if status.as_u16() == 403 => {
                "You don't have access to that.".to_string()
            }
            ApiError::RequestFailed { status, .. } if status.as_u16() == 404 => {
                "Not found.".to_string()
            }
            ApiError::RequestFailed { status, .. } if status.is_server_error() => {
                "Server error. Please try again later.".to_string()
            }
            other => format!("Error: {}", other),
        }
    }
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Network(msg) => ApiError::Network(msg),
            RefreshError::Invalid | RefreshError::Superseded => ApiError::SessionExpired,
            RefreshError::Storage(e) => ApiError::Storage(e),
        }
    }
}
