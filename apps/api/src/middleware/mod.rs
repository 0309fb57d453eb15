//! Middleware components for the Gatekeeper API
//!
//! Every step of the chain is an Axum `from_fn` middleware that either
//! annotates the request and continues, or answers it early:
//! - `parse_access_token`: Records the bearer token, never blocks
//! - `validate_access_token`: Resolves the user if it can, never blocks
//! - `require_access_token`: Resolves the user or refuses the request
//! - `validate_json`: Requires a JSON body on POST/PUT/PATCH
//! - `access_control_headers`: Adds permissive CORS headers
//! - `rate_limit`: Limits requests per client in fixed windows
//!
//! Handlers read the outcome through the `AuthUser`, `MaybeAuthUser` and
//! `AccessToken` extractors.

use axum::response::Response;

pub mod access_token;
pub mod auth;
pub mod context;
pub mod cors;
pub mod json;
pub mod rate_limit;

pub use access_token::{extract_access_token, parse_access_token};
pub use auth::{
    hard_auth, require_access_token, soft_auth, validate_access_token, AccessToken, AuthFailure,
    AuthState, AuthUser, MaybeAuthUser,
};
pub use context::RequestContext;
pub use cors::access_control_headers;
pub use json::{check_json_body, validate_json, JsonBody, JsonBodyLimit};
pub use rate_limit::{extract_client_ip, rate_limit, FixedWindowLimiter, RateLimit};

/// Outcome of one middleware step
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next step
    Continue,
    /// Stop the chain and answer with this response
    Respond(Response),
}

impl Flow {
    /// Check if the chain goes on
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}
