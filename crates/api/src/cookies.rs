//! Cookie names, attribute assembly, and request-side extraction.
//!
//! All cookies ship `HttpOnly; Secure; SameSite=Lax; Path=/`. Sealed
//! cookies carry CookieCodec output; the CSRF cookie carries a raw token
//! that is only ever compared, never trusted.

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use beacon_auth::{AuthError, CookieCodec};
use std::collections::BTreeMap;

pub const SESSION_COOKIE: &str = "session";
pub const FLASH_COOKIE: &str = "flash";
pub const CSRF_COOKIE: &str = "csrf_token";

/// Pull a cookie value out of the request's `Cookie` header.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get(COOKIE)?.to_str().ok()?;
    let prefix = format!("{}=", name);
    cookie_header
        .split(';')
        .map(|s| s.trim())
        .find(|s| s.starts_with(&prefix))?
        .strip_prefix(&prefix)
        .map(|s| s.to_string())
}

/// Assemble a `Set-Cookie` value. `max_age` of `None` makes a session
/// cookie; otherwise the cookie expires after the given seconds.
pub fn build_cookie(name: &str, value: &str, max_age: Option<i64>) -> HeaderValue {
    let mut cookie = format!("{}={}; HttpOnly; Secure; SameSite=Lax; Path=/", name, value);
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }

    HeaderValue::from_str(&cookie).expect("cookie value contains invalid header characters")
}

/// A `Set-Cookie` value that deletes the named cookie immediately.
pub fn clear_cookie(name: &str) -> HeaderValue {
    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        name
    );

    HeaderValue::from_str(&cookie).expect("cookie value contains invalid header characters")
}

/// Seal a payload under the codec and assemble the `Set-Cookie` value.
pub fn sealed_cookie(
    codec: &CookieCodec,
    name: &str,
    values: &BTreeMap<String, String>,
    max_age: Option<i64>,
) -> Result<HeaderValue, AuthError> {
    let encoded = codec.encode(name, values)?;
    Ok(build_cookie(name, &encoded, max_age))
}

/// Seal a payload and expire the cookie immediately (logout overwrite).
pub fn expired_sealed_cookie(
    codec: &CookieCodec,
    name: &str,
    values: &BTreeMap<String, String>,
) -> Result<HeaderValue, AuthError> {
    let encoded = codec.encode(name, values)?;
    let cookie = format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        name, encoded
    );

    Ok(HeaderValue::from_str(&cookie).expect("cookie value contains invalid header characters"))
}

/// One-shot flash cookie carrying a single category/message pair.
pub fn flash_cookie(
    codec: &CookieCodec,
    category: &str,
    message: &str,
) -> Result<HeaderValue, AuthError> {
    let mut values = BTreeMap::new();
    values.insert(category.to_string(), message.to_string());
    sealed_cookie(codec, FLASH_COOKIE, &values, None)
}
