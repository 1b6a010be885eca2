use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The session could not be recovered. Credentials are already cleared
    /// and the sign-in redirect has been issued.
    #[error("Session ended: {0}")]
    Auth(#[from] AuthError),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Email sudah terdaftar")]
    EmailAlreadyRegistered,

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Login failed (status {0}). Please try again")]
    LoginFailed(u16),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Too many attempts. Please try again later")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
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

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True when the error ended the session (credentials cleared, redirected)
    pub fn is_session_ended(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}
