//! Home-server identity client implementation

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use gatekeeper_shared_config::HomeserverConfig;

use crate::error::{HomeserverError, HomeserverResult, UNKNOWN_TOKEN_ERRCODE};
use crate::models::{user_id_from_whoami, MatrixErrorBody};

/// User agent sent to the home server
const USER_AGENT: &str = concat!("Gatekeeper/", env!("CARGO_PKG_VERSION"));

/// Matrix home-server client
///
/// Cheap to clone; the inner HTTP client shares its connection pool.
#[derive(Debug, Clone)]
pub struct HomeserverClient {
    http_client: Client,
    config: HomeserverConfig,
}

impl HomeserverClient {
    /// Create a new home-server client from configuration
    ///
    /// The HTTP client keeps reqwest's default timeouts.
    pub fn new(config: &HomeserverConfig) -> HomeserverResult<Self> {
        let http_client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    /// Ask the home server which user an access token belongs to
    ///
    /// Returns:
    /// - `Ok(Some(user_id))` when the home server names a user
    /// - `Ok(None)` when it answers successfully without naming one
    ///   (empty body, `{}`, non-string `user_id`)
    ///
    /// # Errors
    /// - `HomeserverError::UnknownToken` - The home server answered with `M_UNKNOWN_TOKEN`
    /// - `HomeserverError::Status` - Any other error status, whatever its body
    /// - `HomeserverError::InvalidResponse` - A success status with a non-JSON body
    /// - `HomeserverError::Http` - The request could not be completed
    #[instrument(skip(self, access_token), fields(homeserver = %self.config.url))]
    pub async fn whoami(&self, access_token: &str) -> HomeserverResult<Option<String>> {
        let response = self
            .http_client
            .get(self.config.whoami_url())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Home server unreachable");
                HomeserverError::Http(e)
            })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::error_from_status(status.as_u16(), &text));
        }

        let user_id = Self::parse_identity(&text)?;
        debug!(resolved = user_id.is_some(), "whoami answered");

        Ok(user_id)
    }

    /// Interpret a successful whoami body
    fn parse_identity(text: &str) -> HomeserverResult<Option<String>> {
        if text.is_empty() {
            return Ok(None);
        }

        let body: Value = serde_json::from_str(text)?;
        Ok(user_id_from_whoami(&body))
    }

    /// Classify an error response by its Matrix `errcode`
    ///
    /// A body that is not a Matrix error object never fails here; it just
    /// becomes a plain status error.
    fn error_from_status(status: u16, text: &str) -> HomeserverError {
        let errcode = serde_json::from_str::<MatrixErrorBody>(text)
            .ok()
            .and_then(|body| body.errcode);

        if errcode.as_deref() == Some(UNKNOWN_TOKEN_ERRCODE) {
            debug!(status, "Home server does not recognize the token");
            return HomeserverError::UnknownToken;
        }

        warn!(status, errcode = ?errcode, "Home server returned an error");
        HomeserverError::Status { status, errcode }
    }
}
