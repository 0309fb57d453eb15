//! JSON body enforcement for mutating requests
//!
//! `POST`, `PUT` and `PATCH` requests must carry a JSON object or array.
//! The body is buffered (up to a limit), parsed when the content type says
//! it is JSON, then put back on the request so handlers can still read it.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::Value;
use tracing::debug;

use super::Flow;
use crate::config::DEFAULT_JSON_BODY_LIMIT;
use crate::error::MatrixError;

/// Largest body `validate_json` will buffer, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonBodyLimit(pub usize);

impl Default for JsonBodyLimit {
    fn default() -> Self {
        Self(DEFAULT_JSON_BODY_LIMIT)
    }
}

/// The parsed request body, available to handlers as an extension
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub Value);

/// Methods whose requests must carry JSON
fn requires_json(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// `application/json` or any `+json` media type, parameters ignored
fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json" || essence.ends_with("+json")
}

/// Decide whether a request's parsed body is acceptable
///
/// Only objects and arrays count as JSON bodies. Methods other than
/// POST/PUT/PATCH always continue.
pub fn check_json_body(method: &Method, body: Option<&Value>) -> Flow {
    if !requires_json(method) {
        return Flow::Continue;
    }

    match body {
        Some(Value::Object(_)) | Some(Value::Array(_)) => Flow::Continue,
        _ => Flow::Respond(MatrixError::NotJson.into_response()),
    }
}

fn parse_body(headers: &HeaderMap, bytes: &Bytes) -> Option<Value> {
    if !is_json_content_type(headers) {
        return None;
    }

    serde_json::from_slice(bytes)
        .map_err(|e| debug!(error = %e, "Request body is not valid JSON"))
        .ok()
}

/// Only an exceeded limit is `M_TOO_LARGE`; a body that broke off is no JSON
fn buffering_error(error: axum::Error) -> MatrixError {
    if error.into_inner().is::<LengthLimitError>() {
        MatrixError::TooLarge
    } else {
        MatrixError::NotJson
    }
}

/// Middleware requiring a JSON body on POST/PUT/PATCH
pub async fn validate_json(
    State(limit): State<JsonBodyLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !requires_json(request.method()) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, limit.0).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, limit = limit.0, "Request body could not be buffered");
            return buffering_error(e).into_response();
        }
    };

    let value = parse_body(&parts.headers, &bytes);

    if let Flow::Respond(response) = check_json_body(&parts.method, value.as_ref()) {
        return response;
    }

    if let Some(value) = value {
        parts.extensions.insert(JsonBody(value));
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
