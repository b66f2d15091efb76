// ABOUTME: The SessionStore trait that the HTTP client reads credentials through.
// ABOUTME: Defines the get/set/clear contract and the SessionError type for persistence failures.

use thiserror::Error;

use crate::model::Session;

/// Errors raised when a store fails to persist a change.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Process-wide holder of the current session credentials.
///
/// Reads are infallible: implementations keep an in-memory view and only
/// the write path can fail. Every write updates that view first, so a
/// failed persist never leaves the store reporting stale credentials.
pub trait SessionStore: Send + Sync {
    /// Snapshot of the current credentials.
    fn load(&self) -> Session;

    /// Store a freshly issued token pair (login).
    fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), SessionError>;

    /// Replace the access token, keeping the refresh token (refresh).
    fn set_access_token(&self, access_token: &str) -> Result<(), SessionError>;

    /// Record the user's selected locale.
    fn set_locale(&self, locale: &str) -> Result<(), SessionError>;

    /// Remember (or with `None`, forget) the user id of a password reset in
    /// progress.
    fn set_reset_user_id(&self, user_id: Option<&str>) -> Result<(), SessionError>;

    /// Remove every credential and preference.
    fn clear(&self) -> Result<(), SessionError>;
}
