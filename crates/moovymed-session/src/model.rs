// ABOUTME: The Session credential model held by every session store.
// ABOUTME: Carries the access/refresh token pair, the selected locale, a pending password-reset id and the last-write timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credentials for one signed-in user, plus their locale preference.
///
/// An empty `Session` (the `Default`) means "not signed in, no locale chosen".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// User id handed out by the forgot-password step, consumed by OTP
    /// verification and the final password reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// True when no credential or preference is held.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.locale.is_none()
            && self.reset_user_id.is_none()
    }

    /// True when an access token is present.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// The stored locale, or `default` when none has been chosen.
    pub fn locale_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.locale.as_deref().unwrap_or(default)
    }
}
