//! Request-side credential extraction
//!
//! Pulls the candidate token and the optional identity hint out of request
//! headers, in a fixed order: dedicated header, then `Authorization: Bearer`,
//! then session cookie. Framework-neutral over [`http::HeaderMap`], which is
//! what axum/tower hand to middleware anyway.

use http::HeaderMap;
use http::header::{AUTHORIZATION, COOKIE};

/// Dedicated token header, checked first.
pub const TOKEN_HEADER: &str = "x-auth-token";

/// Companion header carrying the identity hint (email).
pub const IDENTITY_HEADER: &str = "x-auth-user";

/// Session cookie holding the token.
pub const TOKEN_COOKIE: &str = "tessera_token";

/// Companion cookie carrying the identity hint.
pub const IDENTITY_COOKIE: &str = "tessera_user";

/// Candidate credentials pulled from a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedCredentials {
    /// Candidate token
    pub token: String,
    /// Identity hint enabling O(1) per-identity validation
    pub identity_hint: Option<String>,
}

/// Extract the candidate token and identity hint, `None` when no token is
/// present anywhere.
pub fn extract_credentials(headers: &HeaderMap) -> Option<ExtractedCredentials> {
    let token = extract_token(headers)?;
    Some(ExtractedCredentials {
        token,
        identity_hint: extract_identity_hint(headers),
    })
}

/// Candidate token: `X-Auth-Token`, then `Authorization: Bearer`, then the
/// session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = header_str(headers, TOKEN_HEADER) {
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    cookie_value(headers, TOKEN_COOKIE)
}

/// Identity hint: companion header, then companion cookie.
pub fn extract_identity_hint(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = header_str(headers, IDENTITY_HEADER) {
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    cookie_value(headers, IDENTITY_COOKIE)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.split_once('=') {
                if key.trim() == name && !value.trim().is_empty() {
                    return Some(value.trim().to_string());
                }
            }
        }
    }
    None
}
