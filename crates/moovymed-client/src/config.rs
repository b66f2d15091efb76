// ABOUTME: Configuration loading and validation for the MoovyMed API client.
// ABOUTME: Reads MOOVYMED_* environment variables and resolves request paths against the base URL.

use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://app.moovymed.de/api/v1";
pub const DEFAULT_REFRESH_PATH: &str = "/user/refresh";
pub const DEFAULT_LOCALE: &str = "en";

/// Locales the backend serves translations for.
pub const SUPPORTED_LOCALES: &[&str] = &["en", "de"];

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MOOVYMED_API_BASE_URL is not a valid http(s) URL: {0}")]
    InvalidBaseUrl(String),

    #[error("MOOVYMED_HTTP_TIMEOUT_SECS must be a positive integer, got: {0}")]
    InvalidTimeout(String),

    #[error("unsupported locale '{0}' (supported: en, de)")]
    UnsupportedLocale(String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    refresh_path: String,
    default_locale: String,
    timeout: Option<Duration>,
}

impl ClientConfig {
    /// Configuration for the given API origin with every other field at its default.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: validate_base_url(base_url)?,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            default_locale: DEFAULT_LOCALE.to_string(),
            timeout: None,
        })
    }

    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - MOOVYMED_API_BASE_URL: API origin and prefix (default: https://app.moovymed.de/api/v1)
    /// - MOOVYMED_REFRESH_PATH: refresh endpoint path (default: /user/refresh)
    /// - MOOVYMED_DEFAULT_LOCALE: locale sent when none is stored (default: en)
    /// - MOOVYMED_HTTP_TIMEOUT_SECS: overall per-request timeout (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("MOOVYMED_API_BASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let refresh_path = std::env::var("MOOVYMED_REFRESH_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string());

        let default_locale = std::env::var("MOOVYMED_DEFAULT_LOCALE")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());

        let timeout = match std::env::var("MOOVYMED_HTTP_TIMEOUT_SECS") {
            Ok(raw) if !raw.is_empty() => {
                let secs: u64 = raw
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or(ConfigError::InvalidTimeout(raw))?;
                Some(Duration::from_secs(secs))
            }
            _ => None,
        };

        Self::new(&base_url)?
            .with_refresh_path(refresh_path)
            .with_default_locale(&default_locale)
            .map(|config| config.with_timeout(timeout))
    }

    /// Override the refresh endpoint path.
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Override the locale sent when the session holds none.
    pub fn with_default_locale(mut self, locale: &str) -> Result<Self, ConfigError> {
        self.default_locale = validate_locale(locale)?;
        Ok(self)
    }

    /// Set an overall timeout on the underlying HTTP client.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http(s)://` URLs are used as-is; anything else is appended
    /// to the base URL's path prefix (so `/tags` becomes `<base>/tags`).
    pub fn resolve(&self, path: &str) -> Result<Url, String> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };
        Url::parse(&raw).map_err(|e| format!("{}: {}", raw, e))
    }

    /// Absolute URL of the refresh endpoint.
    pub fn refresh_url(&self) -> Result<Url, String> {
        self.resolve(&self.refresh_path)
    }
}

fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim_end_matches('/');
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(trimmed.to_string())
        }
        _ => Err(ConfigError::InvalidBaseUrl(raw.to_string())),
    }
}

/// Check a locale code against [`SUPPORTED_LOCALES`], normalizing case.
pub fn validate_locale(locale: &str) -> Result<String, ConfigError> {
    let normalized = locale.trim().to_ascii_lowercase();
    if SUPPORTED_LOCALES.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(ConfigError::UnsupportedLocale(locale.to_string()))
    }
}
