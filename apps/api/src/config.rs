//! API server configuration

use gatekeeper_shared_config::{
    parse_env, CommonConfig, ConfigResult, HomeserverConfig, RateLimitConfig,
};

/// Default cap on buffered request bodies (1 MiB)
pub const DEFAULT_JSON_BODY_LIMIT: usize = 1024 * 1024;

/// API server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Server port (default: 8080)
    pub port: u16,

    /// Largest request body `validate_json` buffers, in bytes
    pub json_body_limit: usize,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// In production mode `HOMESERVER_URL` must be set; everywhere else the
    /// local development home server is assumed.
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            common: CommonConfig::from_env()?,
            port: parse_env("PORT", 8080)?,
            json_body_limit: parse_env("JSON_BODY_LIMIT", DEFAULT_JSON_BODY_LIMIT)?,
        })
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }

    /// Get home-server configuration
    pub fn homeserver(&self) -> &HomeserverConfig {
        &self.common.homeserver
    }

    /// Get rate limit configuration
    pub fn rate_limit(&self) -> &RateLimitConfig {
        &self.common.rate_limit
    }
}
