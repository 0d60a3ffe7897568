//! Client error types.

use thiserror::Error;

/// Errors surfaced by `ApiClient` calls.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The session cannot be continued: no usable refresh token, or the
    /// refresh exchange was rejected. The caller must sign in again.
    #[error("Session expired")]
    SessionExpired,

    #[error("Token refresh timed out")]
    RefreshTimeout,
}
