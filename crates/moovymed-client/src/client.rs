// ABOUTME: ApiClient, the single call surface every collaborator uses to reach the MoovyMed API.
// ABOUTME: Decorates each dispatch from the session store and retries once after refreshing on a 401.

use std::sync::Arc;

use http::header::ACCEPT;
use http::{HeaderMap, HeaderValue, Method};
use moovymed_session::SessionStore;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::config::ClientConfig;
use crate::decorate::decorate;
use crate::error::ClientError;
use crate::hook::{NoopHook, SessionExpiredHook};
use crate::refresh::Refresher;
use crate::request::{Attempt, RequestBody, RequestDescriptor, RequestOptions};

/// Authenticated client for the MoovyMed REST API.
///
/// Cheap to clone; clones share the HTTP connection pool, the session store
/// and the in-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    pub(crate) session: Arc<dyn SessionStore>,
    refresher: Refresher,
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    config: ClientConfig,
    session: Arc<dyn SessionStore>,
    hook: Arc<dyn SessionExpiredHook>,
    http: Option<reqwest::Client>,
}

impl ApiClientBuilder {
    /// React to terminal auth failures (default: [`NoopHook`]).
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn SessionExpiredHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    /// The configured timeout is not applied to a client supplied here.
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> Result<ApiClient, ClientError> {
        let http = match self.http {
            Some(client) => client,
            None => {
                let mut defaults = HeaderMap::new();
                defaults.insert(ACCEPT, HeaderValue::from_static("application/json"));
                let mut builder = reqwest::Client::builder().default_headers(defaults);
                if let Some(timeout) = self.config.timeout() {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        let refresh_url = self.config.refresh_url().map_err(ClientError::InvalidUrl)?;
        let refresher = Refresher::new(
            http.clone(),
            refresh_url,
            Arc::clone(&self.session),
            self.hook,
        );

        Ok(ApiClient {
            config: Arc::new(self.config),
            http,
            session: self.session,
            refresher,
        })
    }
}

impl ApiClient {
    pub fn builder(config: ClientConfig, session: Arc<dyn SessionStore>) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            session,
            hook: Arc::new(NoopHook),
            http: None,
        }
    }

    /// Client with the default HTTP stack and no session-expired hook.
    pub fn new(config: ClientConfig, session: Arc<dyn SessionStore>) -> Result<Self, ClientError> {
        Self::builder(config, session).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Send one call to the API.
    ///
    /// Returns the response for any 2xx status. A first 401 is recovered by
    /// refreshing the access token and re-dispatching once; every other
    /// failure is returned as the server or transport produced it.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.config.resolve(path).map_err(ClientError::InvalidUrl)?;
        let descriptor = RequestDescriptor::new(method, url, body, options);

        let span = tracing::debug_span!(
            "api_request",
            id = %descriptor.id,
            method = %descriptor.method,
            path = %descriptor.url.path(),
        );
        self.execute(&descriptor).instrument(span).await
    }

    /// `request` followed by decoding the JSON body.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let response = self.request(method, path, body, options).await?;
        read_json(response).await
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        self.request(Method::GET, path, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request_json(Method::GET, path, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ClientError> {
        self.request_json(Method::POST, path, RequestBody::Json(body), RequestOptions::default())
            .await
    }

    async fn execute(&self, descriptor: &RequestDescriptor) -> Result<reqwest::Response, ClientError> {
        let mut attempt = Attempt::First;
        let mut refreshed: Option<String> = None;

        loop {
            // Read the store at dispatch time; never reuse a previous snapshot.
            let mut session = self.session.load();
            if let Some(token) = refreshed.take() {
                session.access_token = Some(token);
            }

            let headers = decorate(&descriptor.options.headers, &session, self.config.default_locale());
            let response = self.dispatch(descriptor, headers, attempt).await?;

            if response.status() != StatusCode::UNAUTHORIZED
                || !attempt.may_refresh()
                || !descriptor.options.recover
            {
                return ensure_success(response).await;
            }

            tracing::info!("access token rejected; attempting recovery");
            attempt = Attempt::Retry;
            refreshed = Some(
                self.refresher
                    .recover(session.access_token.as_deref())
                    .await?,
            );
        }
    }

    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        headers: HeaderMap,
        attempt: Attempt,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .http
            .request(descriptor.method.clone(), descriptor.url.clone())
            .headers(headers);

        if !descriptor.options.query.is_empty() {
            builder = builder.query(&descriptor.options.query);
        }

        builder = match &descriptor.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(pairs) => builder.form(pairs),
            RequestBody::Multipart(parts) => builder.multipart(parts.to_form()?),
        };

        let response = builder.send().await?;
        tracing::debug!(attempt = attempt.as_str(), status = %response.status(), "dispatched");
        Ok(response)
    }
}

/// Turn a non-2xx response into `ClientError::Status`, keeping the body text.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body })
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(Into::into)
}
