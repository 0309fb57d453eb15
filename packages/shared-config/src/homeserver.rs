//! Home-server configuration types

use crate::{get_env_or_default, get_required_env, ConfigError, ConfigResult, Environment};

/// Default home-server URL used outside production
const DEFAULT_HOMESERVER_URL: &str = "http://localhost:8008";

/// Path of the identity endpoint on the home server
pub const WHOAMI_PATH: &str = "/_matrix/client/r0/account/whoami";

/// Upstream Matrix home-server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeserverConfig {
    /// Home-server base URL (e.g., https://matrix.example.org)
    pub url: String,
}

impl HomeserverConfig {
    /// Load home-server configuration from environment variables
    ///
    /// `HOMESERVER_URL` is required in production. Elsewhere it falls back to
    /// a local Synapse default.
    pub fn from_env(environment: Environment) -> ConfigResult<Self> {
        let url = if environment.is_production() {
            get_required_env("HOMESERVER_URL")?
        } else {
            get_env_or_default("HOMESERVER_URL", DEFAULT_HOMESERVER_URL)
        };

        if url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "HOMESERVER_URL".to_string(),
                "URL cannot be empty".to_string(),
            ));
        }

        url::Url::parse(&url)
            .map_err(|e| ConfigError::InvalidUrl("HOMESERVER_URL".to_string(), e.to_string()))?;

        Ok(Self { url })
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Get the full URL for the whoami endpoint
    pub fn whoami_url(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), WHOAMI_PATH)
    }
}

impl Default for HomeserverConfig {
    fn default() -> Self {
        Self::with_url(DEFAULT_HOMESERVER_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whoami_url() {
        let config = HomeserverConfig::with_url("https://matrix.example.org");
        assert_eq!(
            config.whoami_url(),
            "https://matrix.example.org/_matrix/client/r0/account/whoami"
        );
    }

    #[test]
    fn test_whoami_url_with_trailing_slash() {
        let config = HomeserverConfig::with_url("https://matrix.example.org/");
        assert_eq!(
            config.whoami_url(),
            "https://matrix.example.org/_matrix/client/r0/account/whoami"
        );
    }

    #[test]
    fn test_whoami_url_with_empty_base() {
        let config = HomeserverConfig::with_url("");
        assert_eq!(config.whoami_url(), "/_matrix/client/r0/account/whoami");
    }

    #[test]
    fn test_from_env_uses_default_in_development() {
        temp_env::with_var_unset("HOMESERVER_URL", || {
            let config = HomeserverConfig::from_env(Environment::Development).unwrap();
            assert_eq!(config.url, DEFAULT_HOMESERVER_URL);
        });
    }

    #[test]
    fn test_from_env_required_in_production() {
        temp_env::with_var_unset("HOMESERVER_URL", || {
            let result = HomeserverConfig::from_env(Environment::Production);
            assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "HOMESERVER_URL"));
        });
    }

    #[test]
    fn test_from_env_rejects_empty_url() {
        temp_env::with_var("HOMESERVER_URL", Some("  "), || {
            let result = HomeserverConfig::from_env(Environment::Development);
            assert!(matches!(result, Err(ConfigError::InvalidValue(..))));
        });
    }

    #[test]
    fn test_from_env_rejects_relative_url() {
        temp_env::with_var("HOMESERVER_URL", Some("matrix.example.org"), || {
            let result = HomeserverConfig::from_env(Environment::Development);
            assert!(matches!(result, Err(ConfigError::InvalidUrl(..))));
        });
    }

    #[test]
    fn test_from_env_reads_url() {
        temp_env::with_var("HOMESERVER_URL", Some("https://hs.example.org"), || {
            let config = HomeserverConfig::from_env(Environment::Production).unwrap();
            assert_eq!(config.url, "https://hs.example.org");
        });
    }
}
