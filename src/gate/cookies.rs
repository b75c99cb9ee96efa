//! Transport cookies: the wire contract with the portal frontend.
//!
//! Names are compatibility-locked to the deployed frontend. All cookies are
//! scoped to `/` and cleared by an immediate expiry. Only the step-up marker
//! is new wire behavior: it used to be the literal string `true`, now it is a
//! random token validated server-side.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};

/// Access credential cookie.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Refresh credential cookie.
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";
/// Step-up verification marker cookie.
pub const STEP_UP_COOKIE: &str = "biometric-verified";

/// Read a cookie value from the request headers.
#[must_use]
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

/// Build a secure `HttpOnly` cookie header value.
///
/// # Errors
/// Returns an error if the value cannot form a valid header.
pub fn build(
    name: &str,
    value: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build a header value that clears a cookie.
///
/// # Errors
/// Returns an error if the name cannot form a valid header.
pub fn clear(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    build(name, "", 0, secure)
}

/// Append `Set-Cookie` headers carrying a credential pair.
///
/// The access cookie lives as long as the credential; the refresh cookie gets
/// its own longer TTL so it can renew an expired access token.
pub fn append_credential(
    headers: &mut HeaderMap,
    credential: &crate::identity::Credential,
    refresh_ttl_seconds: i64,
    secure: bool,
) {
    let access = build(
        ACCESS_TOKEN_COOKIE,
        &credential.access_token,
        credential.seconds_until_expiry(),
        secure,
    );
    let refresh = build(
        REFRESH_TOKEN_COOKIE,
        &credential.refresh_token,
        refresh_ttl_seconds,
        secure,
    );
    for cookie in [access, refresh] {
        match cookie {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => {
                tracing::error!("failed to build credential cookie: {err}");
            }
        }
    }
}

/// Append `Set-Cookie` headers clearing every credential and marker cookie.
///
/// Used by sign-out and by step-up revocation; infallible by construction
/// since all three names are static.
pub fn append_clear_all(headers: &mut HeaderMap, secure: bool) {
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, STEP_UP_COOKIE] {
        if let Ok(value) = clear(name, secure) {
            headers.append(SET_COOKIE, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn get_parses_cookie_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("a=1; sb-access-token=tok; sb-refresh-token=ref"),
        );
        assert_eq!(get(&headers, ACCESS_TOKEN_COOKIE), Some("tok".to_string()));
        assert_eq!(get(&headers, REFRESH_TOKEN_COOKIE), Some("ref".to_string()));
        assert_eq!(get(&headers, STEP_UP_COOKIE), None);
    }

    #[test]
    fn get_handles_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(get(&headers, ACCESS_TOKEN_COOKIE), None);
    }

    #[test]
    fn build_sets_attributes() {
        let value = build("name", "value", 60, false).expect("cookie");
        let text = value.to_str().expect("ascii");
        assert_eq!(text, "name=value; Path=/; HttpOnly; SameSite=Lax; Max-Age=60");
    }

    #[test]
    fn build_appends_secure_flag() {
        let value = build("name", "value", 60, true).expect("cookie");
        assert!(value.to_str().expect("ascii").ends_with("; Secure"));
    }

    #[test]
    fn clear_uses_immediate_expiry() {
        let value = clear(ACCESS_TOKEN_COOKIE, false).expect("cookie");
        assert!(value.to_str().expect("ascii").contains("Max-Age=0"));
    }

    #[test]
    fn append_clear_all_clears_three_cookies() {
        let mut headers = HeaderMap::new();
        append_clear_all(&mut headers, false);
        let cleared: Vec<_> = headers.get_all(SET_COOKIE).iter().collect();
        assert_eq!(cleared.len(), 3);
    }
}
