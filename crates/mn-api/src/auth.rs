//! Request-side authorization helpers: the per-comment ownership cookie
//! and the client address used for identity fingerprints.

use axum::http::{header, HeaderMap};

/// Name of the ownership cookie scoped to one comment id.
pub fn cookie_name(id: i64) -> String {
    format!("mn-{id}")
}

/// Extracts the ownership token for comment `id` from the Cookie header.
pub fn cookie_token(headers: &HeaderMap, id: i64) -> Option<String> {
    let needle = format!("{}=", cookie_name(id));
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|c| c.strip_prefix(needle.as_str()).map(str::to_string))
}

/// Best-effort client address: the first hop of X-Forwarded-For when a
/// reverse proxy supplies it. The address only ever feeds the identity
/// hasher; it is never stored raw.
pub fn client_addr(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|addr| addr.trim().to_string())
        .unwrap_or_else(|| "127.0.0.1".into())
}
