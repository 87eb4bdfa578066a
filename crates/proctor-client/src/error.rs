//! API error types.

use thiserror::Error;

/// Errors that can occur when talking to the assessment API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The server does not know the session id.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response body was not what the contract promises.
    #[error("failed to parse response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Returns the HTTP status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::InvalidSession(_) => Some(404),
            _ => None,
        }
    }
}
