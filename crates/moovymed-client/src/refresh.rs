// ABOUTME: Access-token refresh with a single shared in-flight refresh per client.
// ABOUTME: Performs the bare refresh call, persists the new token, and wipes the session on terminal failure.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use moovymed_session::SessionStore;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::hook::SessionExpiredHook;

/// Outcome of one refresh, shared by every caller awaiting it: the new
/// access token, or the reason the session was terminated.
type RefreshFuture = Shared<BoxFuture<'static, Result<String, String>>>;

/// Body sent to the refresh endpoint.
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    token: &'a str,
}

/// Success body of the refresh endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "access_token")]
    access_token: String,
    #[serde(default, rename = "refreshToken", alias = "refresh_token")]
    refresh_token: Option<String>,
}

/// Deduplicates refreshes: while one is running, later 401s await it
/// instead of issuing their own.
#[derive(Clone)]
pub(crate) struct Refresher {
    inner: Arc<RefreshInner>,
}

struct RefreshInner {
    http: reqwest::Client,
    url: Url,
    session: Arc<dyn SessionStore>,
    hook: Arc<dyn SessionExpiredHook>,
    in_flight: Mutex<Option<RefreshFuture>>,
}

impl Refresher {
    pub(crate) fn new(
        http: reqwest::Client,
        url: Url,
        session: Arc<dyn SessionStore>,
        hook: Arc<dyn SessionExpiredHook>,
    ) -> Self {
        Self {
            inner: Arc::new(RefreshInner {
                http,
                url,
                session,
                hook,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Obtain a usable access token after `rejected` drew a 401.
    ///
    /// Joins a refresh already in flight; reuses the stored token when it was
    /// rotated after the rejected request went out; fails without a new
    /// refresh when that token was wiped by a terminated session; otherwise
    /// starts a new refresh. Returns `SessionExpired` once the session has
    /// been wiped.
    pub(crate) async fn recover(&self, rejected: Option<&str>) -> Result<String, ClientError> {
        let refresh = {
            let mut slot = self.inner.slot();
            match slot.clone() {
                Some(running) => {
                    tracing::debug!("joining in-flight token refresh");
                    running
                }
                None => {
                    let session = self.inner.session.load();
                    match (session.access_token, rejected) {
                        (Some(current), _) if rejected != Some(current.as_str()) => {
                            tracing::debug!("access token already rotated; retrying with stored token");
                            return Ok(current);
                        }
                        // The token this request carried is gone: an earlier
                        // refresh failed (or the user logged out) and the
                        // session was already wiped and reported.
                        (None, Some(_)) if session.refresh_token.is_none() => {
                            tracing::debug!("session already terminated; not refreshing again");
                            return Err(ClientError::SessionExpired {
                                reason: "session already terminated".to_string(),
                            });
                        }
                        _ => {}
                    }
                    let started = Arc::clone(&self.inner).run().boxed().shared();
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        refresh
            .await
            .map_err(|reason| ClientError::SessionExpired { reason })
    }
}

impl RefreshInner {
    fn slot(&self) -> MutexGuard<'_, Option<RefreshFuture>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drive one refresh to completion, including terminal cleanup, then free
    /// the slot so the next expiry starts a fresh refresh.
    async fn run(self: Arc<Self>) -> Result<String, String> {
        let outcome = self.exchange().await;

        match &outcome {
            Ok(_) => tracing::info!("access token refreshed"),
            Err(reason) => {
                tracing::warn!(reason = %reason, "token refresh failed; clearing session");
                if let Err(e) = self.session.clear() {
                    tracing::warn!(error = %e, "failed to persist cleared session");
                }
                self.hook.session_expired(reason).await;
            }
        }

        self.slot().take();
        outcome
    }

    /// The bare refresh call. It does not pass through decoration or
    /// recovery, so a 401 here is simply a failure.
    async fn exchange(&self) -> Result<String, String> {
        let refresh_token = self
            .session
            .load()
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "no refresh token stored".to_string())?;

        let response = self
            .http
            .post(self.url.clone())
            .json(&RefreshRequest {
                token: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| format!("refresh request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("refresh endpoint returned {}", status));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid refresh response: {}", e))?;

        if body.access_token.is_empty() {
            return Err("refresh response carried an empty access token".to_string());
        }

        let persisted = match body.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            Some(rotated) => self.session.set_tokens(&body.access_token, rotated),
            None => self.session.set_access_token(&body.access_token),
        };
        if let Err(e) = persisted {
            // The in-memory view already holds the new token.
            tracing::warn!(error = %e, "failed to persist refreshed access token");
        }

        Ok(body.access_token)
    }
}
