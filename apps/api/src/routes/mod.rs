//! HTTP route handlers for the Gatekeeper API
//!
//! - Health check endpoints
//! - Session inspection endpoints guarded by the auth middleware

pub mod health;
pub mod session;

pub use health::health_router;
pub use session::{session_router, EchoResponse, SessionResponse};
