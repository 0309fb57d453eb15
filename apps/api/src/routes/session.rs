//! Session inspection routes
//!
//! Small endpoints that expose what the middleware chain resolved:
//! - `GET /session` - Who is calling, if anyone (soft auth)
//! - `POST /session/echo` - Echo a JSON body back to an authenticated caller

use axum::{
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::middleware::{
    require_access_token, validate_access_token, validate_json, AuthState, AuthUser, JsonBody,
    JsonBodyLimit, MaybeAuthUser,
};

/// Response for `GET /session`
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Response for `POST /session/echo`
#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub user_id: String,
    pub body: Value,
}

/// Create session router
///
/// `/session` only annotates the caller; `/session/echo` requires a known
/// user first and a JSON body second.
pub fn session_router(auth: AuthState, json_limit: JsonBodyLimit) -> Router {
    Router::new()
        .route(
            "/",
            get(current_session).layer(middleware::from_fn_with_state(
                auth.clone(),
                validate_access_token,
            )),
        )
        .route(
            "/echo",
            post(echo)
                .layer(middleware::from_fn_with_state(json_limit, validate_json))
                .layer(middleware::from_fn_with_state(auth, require_access_token)),
        )
}

async fn current_session(auth: MaybeAuthUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: auth.user_id.is_some(),
        user_id: auth.user_id,
    })
}

async fn echo(auth: AuthUser, Extension(JsonBody(body)): Extension<JsonBody>) -> Json<EchoResponse> {
    Json(EchoResponse {
        user_id: auth.user_id,
        body,
    })
}
