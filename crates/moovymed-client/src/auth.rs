// ABOUTME: Account calls: login, logout, registration, password reset, profile and locale selection.
// ABOUTME: These create and destroy the credentials that ApiClient decorates requests with.

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::{ApiClient, read_json};
use crate::config::validate_locale;
use crate::error::ClientError;
use crate::request::{RequestBody, RequestOptions};

pub const LOGIN_PATH: &str = "/user/login";
pub const LOGOUT_PATH: &str = "/user/logout";
pub const PROFILE_PATH: &str = "/user/profile";
pub const REGISTER_PATH: &str = "/user/register";
pub const FORGET_PASSWORD_PATH: &str = "/user/forget-password";
pub const VERIFY_OTP_PATH: &str = "/user/forget-password/verify-otp";
pub const RESET_PASSWORD_PATH: &str = "/user/reset-password";

/// Token payload returned by the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// New account details for [`ApiClient::register`].
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Deserialize)]
struct ForgetPasswordResponse {
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiClient {
    /// Exchange a username and password for a session.
    ///
    /// Sends form-encoded credentials and stores the returned token pair.
    /// When the backend issues no separate refresh token the access token is
    /// stored in both slots. A 401 here means bad credentials and is returned
    /// as-is rather than triggering a refresh.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = RequestBody::form([("username", username), ("password", password)]);
        let response = self
            .request(
                Method::POST,
                LOGIN_PATH,
                body,
                RequestOptions::new().without_recovery(),
            )
            .await?;
        let login: LoginResponse = read_json(response).await?;

        let access = login
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ClientError::InvalidResponse("login response carried no access_token".to_string()))?;
        let refresh = login
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(access);

        self.session.set_tokens(access, refresh)?;
        tracing::info!(username = %username, "logged in");

        Ok(login)
    }

    /// End the session. The remote logout is best-effort; the local session
    /// is cleared whatever it returns.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let remote = self
            .request(
                Method::GET,
                LOGOUT_PATH,
                RequestBody::Empty,
                RequestOptions::new().without_recovery(),
            )
            .await;

        if let Err(e) = &remote {
            tracing::warn!(error = %e, "remote logout failed; clearing local session anyway");
        }

        // The language choice outlives the account session.
        let locale = self.session.load().locale;
        self.session.clear()?;
        if let Some(locale) = locale {
            self.session.set_locale(&locale)?;
        }
        tracing::info!("logged out");
        Ok(())
    }

    /// Create an account. The user signs in separately afterwards.
    pub async fn register(&self, registration: &Registration) -> Result<Value, ClientError> {
        let body = self
            .request_json(
                Method::POST,
                REGISTER_PATH,
                RequestBody::json(registration)?,
                RequestOptions::new().without_recovery(),
            )
            .await?;
        let body = expect_status_success(body, "registration failed")?;
        tracing::info!(username = %registration.username, "registered");
        Ok(body)
    }

    /// Start a password reset for `email`. The server mails an OTP and
    /// returns the user id, which is stored for the next two steps.
    pub async fn forget_password(&self, email: &str) -> Result<String, ClientError> {
        let response: ForgetPasswordResponse = self
            .request_json(
                Method::POST,
                FORGET_PASSWORD_PATH,
                RequestBody::form([("email", email)]),
                RequestOptions::new().without_recovery(),
            )
            .await?;

        let user_id = match response.user_id {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(ClientError::InvalidResponse(
                    response
                        .message
                        .unwrap_or_else(|| "forget-password response carried no user_id".to_string()),
                ));
            }
        };

        self.session.set_reset_user_id(Some(&user_id))?;
        tracing::info!("password reset started");
        Ok(user_id)
    }

    /// Check the OTP mailed by [`ApiClient::forget_password`].
    pub async fn verify_otp(&self, otp: &str) -> Result<Value, ClientError> {
        let id = self.pending_reset_id()?;
        let body = self
            .request_json(
                Method::POST,
                VERIFY_OTP_PATH,
                RequestBody::Json(json!({ "id": id, "otp": otp })),
                RequestOptions::new().without_recovery(),
            )
            .await?;
        expect_status_success(body, "invalid OTP")
    }

    /// Finish a password reset. The stored reset id is dropped on success.
    pub async fn reset_password(&self, password: &str, confirmation: &str) -> Result<Value, ClientError> {
        let id = self.pending_reset_id()?;
        let body = self
            .request_json(
                Method::POST,
                RESET_PASSWORD_PATH,
                RequestBody::Json(json!({
                    "id": id,
                    "password": password,
                    "password_confirmation": confirmation,
                })),
                RequestOptions::new().without_recovery(),
            )
            .await?;
        let body = expect_status_success(body, "password reset failed")?;

        self.session.set_reset_user_id(None)?;
        tracing::info!("password reset completed");
        Ok(body)
    }

    fn pending_reset_id(&self) -> Result<String, ClientError> {
        self.session.load().reset_user_id.ok_or(ClientError::NoPendingReset)
    }

    /// Profile of the signed-in user.
    pub async fn profile(&self) -> Result<serde_json::Value, ClientError> {
        self.get_json(PROFILE_PATH).await
    }

    /// Change the signed-in user's email and display name.
    pub async fn update_profile(&self, email: &str, name: &str) -> Result<Value, ClientError> {
        self.post_json(PROFILE_PATH, json!({ "email": email, "name": name }))
            .await
    }

    /// Validate and store the locale sent as `X-Locale` on later calls.
    pub fn set_locale(&self, locale: &str) -> Result<String, ClientError> {
        let locale = validate_locale(locale)?;
        self.session.set_locale(&locale)?;
        Ok(locale)
    }
}

/// Account endpoints answer 200 with `"status": "error"` on rejection.
fn expect_status_success(body: Value, fallback: &str) -> Result<Value, ClientError> {
    match body.get("status").and_then(Value::as_str) {
        Some(status) if status != "success" => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(fallback);
            Err(ClientError::InvalidResponse(message.to_string()))
        }
        _ => Ok(body),
    }
}
