// ABOUTME: Immutable request descriptors, request bodies and per-call options.
// ABOUTME: Also defines Attempt, the explicit retry counter carried alongside a descriptor.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use reqwest::Url;
use serde::Serialize;
use ulid::Ulid;

use crate::error::ClientError;

/// Body of an outbound call. Cloneable so the call can be re-dispatched.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// `multipart/form-data`, rebuilt from owned parts on every dispatch.
    Multipart(MultipartBody),
}

/// One field of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: Option<String>,
        data: Vec<u8>,
    },
}

/// Owned multipart fields. `reqwest::multipart::Form` is consumed by a send
/// and is not `Clone`, so a fresh form is built per dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartBody {
    parts: Vec<MultipartPart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.map(String::from),
            data,
        });
        self
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    /// Build the wire form. Fails only on an unparseable content type.
    pub fn to_form(&self) -> Result<reqwest::multipart::Form, ClientError> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                MultipartPart::Text { name, value } => form.text(name.clone(), value.clone()),
                MultipartPart::File {
                    name,
                    file_name,
                    content_type,
                    data,
                } => {
                    let mut file = reqwest::multipart::Part::bytes(data.clone())
                        .file_name(file_name.clone());
                    if let Some(mime) = content_type {
                        file = file.mime_str(mime)?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

impl RequestBody {
    /// Serialize any value into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ClientError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn form<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Per-call options supplied by the caller.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    /// Whether a 401 may trigger the refresh-and-retry path. Credential
    /// endpoints (login, logout) turn this off so a bad password is reported
    /// as a plain 401.
    pub recover: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            query: Vec::new(),
            recover: true,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn without_recovery(mut self) -> Self {
        self.recover = false;
        self
    }
}

/// Everything needed to (re-)dispatch one logical call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub id: Ulid,
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
    pub options: RequestOptions,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: Url, body: RequestBody, options: RequestOptions) -> Self {
        Self {
            id: Ulid::new(),
            method,
            url,
            body,
            options,
        }
    }
}

/// Which dispatch of a descriptor this is. A descriptor gets at most one
/// `Retry`, and only the `First` attempt may start a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retry,
}

impl Attempt {
    pub fn may_refresh(self) -> bool {
        self == Self::First
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Retry => "retry",
        }
    }
}
