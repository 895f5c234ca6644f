//! Protection of the manual endpoints: HTTP basic auth and/or a cookie.

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use deployer_core::config::ProtectionConfig;

/// Result of checking a request against the configured protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Request may proceed; the cookie (if any) is set on the response.
    Granted { set_cookie: Option<String> },
    Denied(&'static str),
}

pub fn check(protection: Option<&ProtectionConfig>, headers: &HeaderMap) -> Access {
    let Some(protection) = protection.filter(|p| p.is_active()) else {
        return Access::Granted { set_cookie: None };
    };
    let cookie = protection.session_cookie();
    let set_cookie = cookie.as_ref().map(|c| c.header_value());

    let mut reason = "Authentication";
    if let (Some((username, password)), Some((user, pass))) =
        (protection.basic_credentials(), basic_auth(headers))
    {
        if user == username && pass == password {
            return Access::Granted { set_cookie };
        }
        reason = "Invalid credentials";
    }

    if let Some(cookie) = &cookie
        && request_cookie(headers, cookie.name).as_deref() == Some(cookie.value)
    {
        return Access::Granted { set_cookie };
    }

    Access::Denied(reason)
}

/// 401 asking the client for basic credentials.
pub fn unauthorized(reason: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Deployer\"")],
        reason,
    )
        .into_response()
}

pub fn with_cookie(mut response: Response, set_cookie: Option<String>) -> Response {
    if let Some(value) = set_cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

fn basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
