//! Session error types.
//!
//! Returned by the session runner when a run cannot reach a submitted state.

use thiserror::Error;

/// Errors that end a session run.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Input ended before a session was started and nothing else was pending.
    #[error("input closed before the assessment started")]
    InputClosed,

    /// The submission request failed. It is never retried.
    #[error("submission failed: {0}")]
    SubmitFailed(String),
}

impl SessionError {
    /// Returns `true` if answers may have been lost on the server side.
    pub fn is_submission_failure(&self) -> bool {
        matches!(self, SessionError::SubmitFailed(_))
    }
}
