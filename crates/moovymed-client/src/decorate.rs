// ABOUTME: Pre-dispatch decoration that adds the bearer token and locale headers.
// ABOUTME: Pure function over caller headers and a session snapshot, so it is total and easy to test.

use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName, HeaderValue};
use moovymed_session::Session;

/// Header carrying the caller's selected locale.
pub const LOCALE_HEADER: HeaderName = HeaderName::from_static("x-locale");

/// Build the headers for one dispatch.
///
/// Caller headers are kept as given; `Authorization` is set when `session`
/// holds an access token and `X-Locale` is always set. Values that cannot be
/// encoded as a header are skipped (token) or replaced by `default_locale`.
pub fn decorate(caller: &HeaderMap, session: &Session, default_locale: &str) -> HeaderMap {
    let mut headers = caller.clone();

    if let Some(token) = session.access_token.as_deref() {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("stored access token is not a valid header value; sending unauthenticated"),
        }
    }

    let locale = HeaderValue::from_str(session.locale_or(default_locale))
        .or_else(|_| HeaderValue::from_str(default_locale))
        .unwrap_or_else(|_| HeaderValue::from_static("en"));
    headers.insert(LOCALE_HEADER, locale);

    headers
}
