// ABOUTME: Authenticated HTTP client for the MoovyMed content API.
// ABOUTME: Adds bearer/locale headers to every call and refreshes an expired access token once per request.

pub mod auth;
pub mod client;
pub mod config;
pub mod content;
pub mod decorate;
pub mod error;
pub mod hook;
mod refresh;
pub mod request;

pub use auth::{LoginResponse, Registration};
pub use client::{ApiClient, ApiClientBuilder};
pub use config::{ClientConfig, ConfigError, SUPPORTED_LOCALES};
pub use content::{ContentUpload, UploadFile};
pub use decorate::LOCALE_HEADER;
pub use error::ClientError;
pub use hook::{NoopHook, SessionExpiredHook};
pub use request::{
    Attempt, MultipartBody, MultipartPart, RequestBody, RequestDescriptor, RequestOptions,
};

pub use http::Method;
