//! Gatekeeper API library
//!
//! Matrix access-token middleware for Axum, plus the router the server
//! binary runs. Exposed as a library for integration tests and for reuse in
//! other Axum applications.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Router};

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorResponse, MatrixError};
pub use middleware::{AuthState, Flow, JsonBodyLimit, RateLimit, RequestContext};

use middleware::{access_control_headers, parse_access_token, rate_limit};
use routes::{health_router, session_router};

/// Build the application router with the full middleware chain
///
/// Every request gets CORS headers, is rate limited, and has its access
/// token parsed before it reaches a route. Auth and JSON checks are applied
/// per route.
pub fn build_router(auth: AuthState, limit: RateLimit, json_limit: JsonBodyLimit) -> Router {
    Router::new()
        .route("/", get(root))
        // Nested health routes: /health, /health/live
        .nest("/health", health_router())
        // Session routes: /session, /session/echo
        .nest("/session", session_router(auth, json_limit))
        .layer(axum_middleware::from_fn(parse_access_token))
        .layer(axum_middleware::from_fn_with_state(limit, rate_limit))
        .layer(axum_middleware::from_fn(access_control_headers))
}

async fn root() -> &'static str {
    "Gatekeeper - Matrix access-token middleware"
}
