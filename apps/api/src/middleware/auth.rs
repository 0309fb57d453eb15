//! Access-token validation against the home server
//!
//! Two middleware share one resolution step:
//! - `validate_access_token`: soft auth, records the user when the home
//!   server names one and lets every request through
//! - `require_access_token`: hard auth, refuses the request unless the
//!   home server names a user
//!
//! Handlers read the result with the extractors defined here:
//!
//! ```rust,ignore
//! use gatekeeper_api::middleware::{AuthUser, MaybeAuthUser};
//!
//! // Behind require_access_token
//! async fn protected_handler(auth: AuthUser) -> impl IntoResponse {
//!     format!("Hello, {}!", auth.user_id)
//! }
//!
//! // Behind validate_access_token
//! async fn optional_auth_handler(auth: MaybeAuthUser) -> impl IntoResponse {
//!     match auth.user_id {
//!         Some(user_id) => format!("Hello, {}!", user_id),
//!         None => "Hello, guest!".to_string(),
//!     }
//! }
//! ```

use std::sync::Arc;

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use gatekeeper_homeserver_client::{HomeserverClient, HomeserverResult};
use gatekeeper_shared_config::HomeserverConfig;
use tracing::{debug, warn};

use super::access_token::extract_access_token;
use super::context::RequestContext;
use super::Flow;
use crate::error::MatrixError;

/// Shared state for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    client: Arc<HomeserverClient>,
}

impl AuthState {
    /// Create auth state around an existing client
    pub fn new(client: HomeserverClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create auth state from home-server configuration
    pub fn from_config(config: &HomeserverConfig) -> HomeserverResult<Self> {
        Ok(Self::new(HomeserverClient::new(config)?))
    }

    pub fn client(&self) -> &HomeserverClient {
        &self.client
    }
}

/// Why a request could not be tied to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The request carried no token
    MissingToken,
    /// The home server does not know the token or named no user
    UnknownToken,
    /// The home server could not answer
    Backend,
}

impl From<AuthFailure> for MatrixError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::MissingToken => MatrixError::MissingToken,
            AuthFailure::UnknownToken => MatrixError::UnknownToken,
            AuthFailure::Backend => MatrixError::Backend,
        }
    }
}

/// Ask the home server who the context's token belongs to
///
/// One call per request; the answer is never cached.
async fn resolve_user(
    client: &HomeserverClient,
    context: &RequestContext,
) -> Result<String, AuthFailure> {
    let token = context
        .access_token
        .as_deref()
        .ok_or(AuthFailure::MissingToken)?;

    match client.whoami(token).await {
        Ok(Some(user_id)) => Ok(user_id),
        Ok(None) => Err(AuthFailure::UnknownToken),
        Err(e) if e.is_unknown_token() => Err(AuthFailure::UnknownToken),
        Err(e) => {
            warn!(error = %e, "Token validation failed on the home server");
            Err(AuthFailure::Backend)
        }
    }
}

/// Soft auth: record the user if the home server names one
///
/// Always continues. Failures are only logged.
pub async fn soft_auth(client: &HomeserverClient, context: &mut RequestContext) -> Flow {
    if context.access_token.is_none() {
        return Flow::Continue;
    }

    match resolve_user(client, context).await {
        Ok(user_id) => {
            debug!("Request authenticated");
            context.user_id = Some(user_id);
        }
        Err(failure) => {
            debug!(failure = ?failure, "Continuing unauthenticated");
        }
    }

    Flow::Continue
}

/// Hard auth: record the user or answer with the matching Matrix error
///
/// Continues only when the home server names a user.
pub async fn hard_auth(client: &HomeserverClient, context: &mut RequestContext) -> Flow {
    match resolve_user(client, context).await {
        Ok(user_id) => {
            debug!("Request authenticated");
            context.user_id = Some(user_id);
            Flow::Continue
        }
        Err(failure) => Flow::Respond(MatrixError::from(failure).into_response()),
    }
}

/// Context for the auth steps, with the token extracted if no earlier step did
fn auth_context(request: &mut Request<Body>) -> RequestContext {
    let mut context = RequestContext::take(request.extensions_mut());
    if context.access_token.is_none() {
        context.access_token = extract_access_token(request.headers(), request.uri().query());
    }
    context
}

/// Middleware for optional authentication
pub async fn validate_access_token(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let mut context = auth_context(&mut request);
    if let Flow::Respond(response) = soft_auth(state.client(), &mut context).await {
        return response;
    }
    context.store(request.extensions_mut());

    next.run(request).await
}

/// Middleware for required authentication
pub async fn require_access_token(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let mut context = auth_context(&mut request);

    match hard_auth(state.client(), &mut context).await {
        Flow::Continue => {
            context.store(request.extensions_mut());
            next.run(request).await
        }
        Flow::Respond(response) => response,
    }
}

// ========== Extractors ==========

/// Authenticated user extractor - requires a resolved user
///
/// Use behind `require_access_token` (or `validate_access_token` for routes
/// that want to refuse anonymous callers themselves). Answers 403
/// `M_MISSING_TOKEN` when no user was resolved.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Matrix user ID exactly as the home server returned it
    pub user_id: String,
    /// The token the user was resolved from
    pub access_token: String,
}

/// Optional authentication extractor
///
/// Never rejects; `user_id` is `None` for anonymous requests.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser {
    /// Matrix user ID, if one was resolved
    pub user_id: Option<String>,
}

/// The raw access token the request carried
///
/// Answers 403 `M_MISSING_TOKEN` when there is none.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = MatrixError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = RequestContext::get(&parts.extensions).ok_or(MatrixError::MissingToken)?;

        match (&context.user_id, &context.access_token) {
            (Some(user_id), Some(access_token)) => Ok(AuthUser {
                user_id: user_id.clone(),
                access_token: access_token.clone(),
            }),
            _ => Err(MatrixError::MissingToken),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser {
            user_id: RequestContext::get(&parts.extensions).and_then(|c| c.user_id.clone()),
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AccessToken
where
    S: Send + Sync,
{
    type Rejection = MatrixError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Routes without parse_access_token still see the token
        let token = RequestContext::get(&parts.extensions)
            .and_then(|c| c.access_token.clone())
            .or_else(|| extract_access_token(&parts.headers, parts.uri.query()));

        token.map(AccessToken).ok_or(MatrixError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::StatusCode;
    use gatekeeper_test_utils::MockHomeserver;
    use tracing_test::traced_test;

    async fn fixture_client() -> (MockHomeserver, HomeserverClient) {
        let homeserver = MockHomeserver::start().await;
        homeserver.mock_fixture_tokens().await;
        let client = HomeserverClient::new(&HomeserverConfig::with_url(homeserver.url())).unwrap();
        (homeserver, client)
    }

    fn context_with(token: Option<&str>) -> RequestContext {
        RequestContext {
            access_token: token.map(str::to_string),
            user_id: None,
        }
    }

    fn expect_status(flow: Flow, status: StatusCode) {
        match flow {
            Flow::Respond(response) => assert_eq!(response.status(), status),
            Flow::Continue => panic!("Expected a {} response, chain continued", status),
        }
    }

    #[tokio::test]
    async fn test_hard_auth_resolves_user() {
        let (_homeserver, client) = fixture_client().await;
        let mut context = context_with(Some("goodfox"));

        let flow = hard_auth(&client, &mut context).await;

        assert!(flow.is_continue());
        assert_eq!(context.user_id.as_deref(), Some("@fox:localhost"));
    }

    #[tokio::test]
    async fn test_hard_auth_missing_token() {
        let (homeserver, client) = fixture_client().await;
        let mut context = context_with(None);

        expect_status(hard_auth(&client, &mut context).await, StatusCode::FORBIDDEN);
        assert_eq!(homeserver.whoami_calls().await, 0);
    }

    #[tokio::test]
    async fn test_hard_auth_no_identity() {
        let (_homeserver, client) = fixture_client().await;
        let mut context = context_with(Some("badfox"));

        expect_status(hard_auth(&client, &mut context).await, StatusCode::FORBIDDEN);
        assert_eq!(context.user_id, None);
    }

    #[tokio::test]
    async fn test_hard_auth_unknown_token() {
        let (_homeserver, client) = fixture_client().await;
        let mut context = context_with(Some("invalidfox"));

        expect_status(hard_auth(&client, &mut context).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_hard_auth_backend_failure() {
        let (_homeserver, client) = fixture_client().await;
        let mut context = context_with(Some("superbadfox"));

        expect_status(
            hard_auth(&client, &mut context).await,
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }

    #[tokio::test]
    async fn test_soft_auth_always_continues() {
        let (_homeserver, client) = fixture_client().await;

        for token in [None, Some("badfox"), Some("invalidfox"), Some("superbadfox")] {
            let mut context = context_with(token);
            assert!(soft_auth(&client, &mut context).await.is_continue());
            assert_eq!(context.user_id, None);
        }

        let mut context = context_with(Some("goodfox"));
        assert!(soft_auth(&client, &mut context).await.is_continue());
        assert_eq!(context.user_id.as_deref(), Some("@fox:localhost"));
    }

    #[tokio::test]
    async fn test_soft_auth_without_token_skips_home_server() {
        let (homeserver, client) = fixture_client().await;
        let mut context = context_with(None);

        soft_auth(&client, &mut context).await;
        assert_eq!(homeserver.whoami_calls().await, 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_tokens_and_users_never_logged() {
        let (_homeserver, client) = fixture_client().await;

        for token in ["goodfox", "badfox", "invalidfox", "superbadfox"] {
            let mut context = context_with(Some(token));
            hard_auth(&client, &mut context).await;
        }

        assert!(logs_contain("Request authenticated"));
        assert!(logs_contain("Token validation failed"));
        assert!(!logs_contain("goodfox"));
        assert!(!logs_contain("superbadfox"));
        assert!(!logs_contain("@fox:localhost"));
    }

    #[test]
    fn test_auth_failure_maps_to_matrix_error() {
        assert_eq!(
            MatrixError::from(AuthFailure::MissingToken).errcode(),
            "M_MISSING_TOKEN"
        );
        assert_eq!(
            MatrixError::from(AuthFailure::UnknownToken).errcode(),
            "M_UNKNOWN_TOKEN"
        );
        assert_eq!(MatrixError::from(AuthFailure::Backend).errcode(), "M_UNKNOWN");
    }

    #[tokio::test]
    async fn test_auth_user_extractor_requires_user() {
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let result = AuthUser::from_request_parts(&mut parts, &()).await;
        assert_matches!(result, Err(MatrixError::MissingToken));

        RequestContext {
            access_token: Some("goodfox".to_string()),
            user_id: Some("@fox:localhost".to_string()),
        }
        .store(&mut parts.extensions);

        let auth = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(auth.user_id, "@fox:localhost");
        assert_eq!(auth.access_token, "goodfox");
    }

    #[tokio::test]
    async fn test_maybe_auth_user_extractor() {
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let auth = MaybeAuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(auth.user_id, None);
    }

    #[tokio::test]
    async fn test_access_token_extractor_reads_headers() {
        let request = Request::builder()
            .header("Authorization", "Bearer goodfox")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let AccessToken(token) = AccessToken::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(token, "goodfox");
    }
}
