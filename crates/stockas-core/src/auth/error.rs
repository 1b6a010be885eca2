use thiserror::Error;

/// Failures of the session lifecycle. Every variant raised by the refresh
/// path is returned only after the credential store has been cleared.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Refresh rejected by server (status {status})")]
    RefreshRejected { status: u16 },

    #[error("Refresh response is missing the new token pair")]
    MalformedRefreshResponse,

    #[error("Access token is {length} characters, limit is {limit}")]
    OversizedToken { length: usize, limit: usize },

    #[error("Network error during token refresh: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Credential storage failed: {0}")]
    Storage(#[from] anyhow::Error),
}
