//! Bearer token extraction
//!
//! A token is read from `Authorization: Bearer <token>` (scheme matched
//! case-insensitively) or, failing that, from the `access_token` query
//! parameter. The header always wins.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::context::RequestContext;

/// Scheme prefix including its single separating space
const BEARER_PREFIX: &str = "bearer ";

/// Query parameter carrying a token when no header is sent
const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Read the token from the Authorization header
///
/// Everything after `Bearer ` is the token, untrimmed. Values that are not
/// visible ASCII count as absent.
fn token_from_header(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let scheme = value.get(..BEARER_PREFIX.len())?;

    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }

    let token = &value[BEARER_PREFIX.len()..];
    (!token.is_empty()).then(|| token.to_string())
}

/// Read the first `access_token` query parameter, percent-decoded
fn token_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == ACCESS_TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

/// Find the access token a request carries, if any
pub fn extract_access_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    token_from_header(headers).or_else(|| query.and_then(token_from_query))
}

/// Middleware recording the request's access token in its context
///
/// Never blocks; a request without a token simply continues without one.
pub async fn parse_access_token(mut request: Request<Body>, next: Next) -> Response {
    let token = extract_access_token(request.headers(), request.uri().query());

    let mut context = RequestContext::take(request.extensions_mut());
    if let Some(token) = token {
        context.access_token = Some(token);
    }
    debug!(
        has_token = context.access_token.is_some(),
        "Access token parsed"
    );
    context.store(request.extensions_mut());

    next.run(request).await
}
