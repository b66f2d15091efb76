// ABOUTME: The SessionExpiredHook trait through which the calling layer reacts to terminal auth failure.
// ABOUTME: Runs after credentials are wiped, e.g. to send the user back to the login entry point.

use async_trait::async_trait;

/// Application-boundary reaction to an irrecoverable authorization failure.
///
/// Invoked exactly once per failed refresh, after the session store has been
/// cleared and before `ClientError::SessionExpired` reaches any caller.
#[async_trait]
pub trait SessionExpiredHook: Send + Sync {
    async fn session_expired(&self, reason: &str);
}

/// Hook that does nothing; callers handle `SessionExpired` themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

#[async_trait]
impl SessionExpiredHook for NoopHook {
    async fn session_expired(&self, _reason: &str) {}
}
