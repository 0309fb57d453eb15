//! Health check HTTP route handlers
//!
//! - `GET /health` - Simple liveness check (returns 200 OK)
//! - `GET /health/live` - Liveness probe with version information

use axum::{response::IntoResponse, routing::get, Json, Router};

/// Create health check router
pub fn health_router() -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness_probe))
}

/// Simple health check - always returns OK if the server is running
async fn simple_health() -> &'static str {
    "OK"
}

/// Liveness probe
///
/// Does not call the home server; a home-server outage only shows up as
/// failed authentications.
async fn liveness_probe() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
