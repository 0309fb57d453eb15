//! Common test utilities for API integration tests
//!
//! Builds the full router against a mock home server and provides small
//! request/response helpers.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use gatekeeper_api::{build_router, AuthState, JsonBodyLimit, RateLimit};
use gatekeeper_shared_config::{HomeserverConfig, RateLimitConfig};
use gatekeeper_test_utils::MockHomeserver;
use serde_json::Value;

/// A router wired to a mock home server with the usual token fixtures
pub struct TestApp {
    pub homeserver: MockHomeserver,
    pub router: Router,
}

impl TestApp {
    /// Start with rate limiting disabled
    pub async fn start() -> Self {
        Self::with_rate_limit(RateLimitConfig::disabled()).await
    }

    /// Start with the given rate limit configuration
    pub async fn with_rate_limit(config: RateLimitConfig) -> Self {
        let homeserver = MockHomeserver::start().await;
        homeserver.mock_fixture_tokens().await;

        let auth = AuthState::from_config(&HomeserverConfig::with_url(homeserver.url())).unwrap();
        let router = build_router(auth, RateLimit::new(&config), JsonBodyLimit::default());

        Self { homeserver, router }
    }
}

/// `GET` request with an optional bearer token
pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Request with a JSON content type and the given raw body
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Read a response body as JSON
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as text
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
