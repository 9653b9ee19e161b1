//! `refresh_token` cookie helpers.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};

use super::config::AuthConfig;

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Build the `Set-Cookie` value carrying a fresh refresh credential.
///
/// # Errors
/// Returns an error if the value contains bytes not allowed in a header.
pub fn refresh_cookie(config: &AuthConfig, value: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = config.refresh_ttl().as_secs();
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the `Set-Cookie` value that removes the refresh credential.
///
/// # Errors
/// Returns an error if the cookie cannot be encoded as a header.
pub fn clear_refresh_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{REFRESH_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Read the refresh credential from any `Cookie` header. Empty values count as absent.
#[must_use]
pub fn extract_refresh_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == REFRESH_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
