// ABOUTME: Error type returned by every ApiClient call.
// ABOUTME: Separates untouched transport/status failures from the terminal session-expired outcome.

use moovymed_session::SessionError;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Timeouts, DNS failures, connection resets. Never retried.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A non-2xx response, passed through as the server sent it.
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The access token was rejected and could not be refreshed. The session
    /// has already been cleared when this is returned.
    #[error("session expired: {reason}")]
    SessionExpired { reason: String },

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// OTP verification or password reset without a prior forget-password.
    #[error("no password reset in progress")]
    NoPendingReset,

    #[error("session store error: {0}")]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// HTTP status of a `Status` failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }
}
