//! Mock Matrix home server for testing token resolution
//!
//! Provides a [`MockHomeserver`] that answers
//! `GET /_matrix/client/r0/account/whoami` per access token.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub use gatekeeper_shared_config::WHOAMI_PATH;

/// Priority of the catch-all mocks; token-specific mocks use the default (5)
const FALLBACK_PRIORITY: u8 = 10;

/// Mock Matrix home server
///
/// This struct wraps a [`wiremock::MockServer`] and provides convenience methods
/// for the whoami answers the middleware has to handle.
///
/// # Example
///
/// ```rust,ignore
/// use gatekeeper_test_utils::MockHomeserver;
///
/// #[tokio::test]
/// async fn test_whoami() {
///     let homeserver = MockHomeserver::start().await;
///     homeserver.mock_user("goodfox", "@fox:localhost").await;
///     homeserver.mock_unknown_token("invalidfox").await;
///
///     // Configure your client with homeserver.url()
/// }
/// ```
pub struct MockHomeserver {
    server: MockServer,
}

impl MockHomeserver {
    /// Start a new mock home server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Number of whoami requests received so far
    pub async fn whoami_calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == WHOAMI_PATH)
            .count()
    }

    /// Mount a whoami answer for one token
    pub async fn mock_whoami(&self, token: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(WHOAMI_PATH))
            .and(header("Authorization", format!("Bearer {}", token).as_str()))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// The token belongs to `user_id`
    pub async fn mock_user(&self, token: &str, user_id: &str) {
        self.mock_whoami(
            token,
            ResponseTemplate::new(200).set_body_json(json!({
                "user_id": user_id,
                "device_id": "GATEKEEPER",
            })),
        )
        .await;
    }

    /// The home server answers with an empty object for this token
    pub async fn mock_no_user(&self, token: &str) {
        self.mock_whoami(token, ResponseTemplate::new(200).set_body_json(json!({})))
            .await;
    }

    /// The home server rejects the token with `M_UNKNOWN_TOKEN`
    pub async fn mock_unknown_token(&self, token: &str) {
        self.mock_whoami(token, unknown_token_response()).await;
    }

    /// The home server fails with a status and JSON body for this token
    pub async fn mock_failure(&self, token: &str, status_code: u16, body: Value) {
        self.mock_whoami(token, ResponseTemplate::new(status_code).set_body_json(body))
            .await;
    }

    /// The home server fails with an HTML error page for this token
    pub async fn mock_html_failure(&self, token: &str, status_code: u16) {
        self.mock_whoami(
            token,
            ResponseTemplate::new(status_code)
                .set_body_raw("<html><body>Bad Gateway</body></html>", "text/html"),
        )
        .await;
    }

    /// The home server answers this token only after `delay_ms`
    pub async fn mock_slow_user(&self, token: &str, user_id: &str, delay_ms: u64) {
        self.mock_whoami(
            token,
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(delay_ms))
                .set_body_json(json!({ "user_id": user_id })),
        )
        .await;
    }

    /// Reject every token without a more specific mock as unknown
    pub async fn mock_unknown_by_default(&self) {
        Mock::given(method("GET"))
            .and(path(WHOAMI_PATH))
            .respond_with(unknown_token_response())
            .with_priority(FALLBACK_PRIORITY)
            .mount(&self.server)
            .await;
    }

    /// Mount the usual token fixtures
    ///
    /// - `goodfox` resolves to `@fox:localhost`
    /// - `badfox` resolves to no user
    /// - `invalidfox` is unknown
    /// - `superbadfox` makes the home server fail with 500
    pub async fn mock_fixture_tokens(&self) {
        self.mock_user("goodfox", "@fox:localhost").await;
        self.mock_no_user("badfox").await;
        self.mock_unknown_token("invalidfox").await;
        self.mock_failure(
            "superbadfox",
            500,
            json!({"errcode": "M_UNKNOWN", "error": "Internal server error"}),
        )
        .await;
    }
}

fn unknown_token_response() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "errcode": "M_UNKNOWN_TOKEN",
        "error": "Invalid macaroon passed.",
        "soft_logout": false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn whoami(server: &MockHomeserver, token: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("{}{}", server.url(), WHOAMI_PATH))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_mock_homeserver_starts() {
        let server = MockHomeserver::start().await;
        assert!(server.url().starts_with("http://"));
        assert_eq!(server.whoami_calls().await, 0);
    }

    #[tokio::test]
    async fn test_mock_user() {
        let server = MockHomeserver::start().await;
        server.mock_user("goodfox", "@fox:localhost").await;

        let response = whoami(&server, "goodfox").await;
        assert!(response.status().is_success());

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["user_id"], "@fox:localhost");
        assert_eq!(server.whoami_calls().await, 1);
    }

    #[tokio::test]
    async fn test_fixture_tokens() {
        let server = MockHomeserver::start().await;
        server.mock_fixture_tokens().await;

        assert_eq!(whoami(&server, "goodfox").await.status().as_u16(), 200);
        assert_eq!(whoami(&server, "badfox").await.status().as_u16(), 200);
        assert_eq!(whoami(&server, "invalidfox").await.status().as_u16(), 401);
        assert_eq!(whoami(&server, "superbadfox").await.status().as_u16(), 500);
        assert_eq!(server.whoami_calls().await, 4);
    }

    #[tokio::test]
    async fn test_specific_token_beats_fallback() {
        let server = MockHomeserver::start().await;
        server.mock_unknown_by_default().await;
        server.mock_user("goodfox", "@fox:localhost").await;

        assert_eq!(whoami(&server, "goodfox").await.status().as_u16(), 200);
        assert_eq!(whoami(&server, "strangerfox").await.status().as_u16(), 401);
    }

    #[tokio::test]
    async fn test_html_failure() {
        let server = MockHomeserver::start().await;
        server.mock_html_failure("superbadfox", 502).await;

        let response = whoami(&server, "superbadfox").await;
        assert_eq!(response.status().as_u16(), 502);
        assert!(response.text().await.unwrap().contains("Bad Gateway"));
    }
}
