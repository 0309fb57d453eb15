//! Rate limiting configuration types

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{parse_env, ConfigResult};

/// Window length used when none (or zero) is configured
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Requests allowed per window when no maximum is configured
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Added to the window length when advertising `retry_after_ms`
pub const RETRY_AFTER_EXTRA_MS: u64 = 100;

/// Request rate limit configuration
///
/// Supplied once when the middleware is built and immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether requests are limited at all
    pub enabled: bool,

    /// Window length in milliseconds (default: 60000)
    pub window_ms: Option<u64>,

    /// Maximum requests per client within one window (default: 5, 0 = unlimited)
    pub max: Option<u32>,

    /// Body sent when a client is limited (default: `M_LIMIT_EXCEEDED` error)
    pub message: Option<Value>,

    /// Key clients on `X-Forwarded-For` / `X-Real-IP` instead of the peer
    /// address. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Load rate limit configuration from environment variables
    ///
    /// `RATE_LIMIT_MESSAGE` is parsed as JSON; anything that is not valid JSON
    /// is taken as a plain string message.
    pub fn from_env() -> ConfigResult<Self> {
        let window_ms: u64 = parse_env("RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS)?;
        let max: u32 = parse_env("RATE_LIMIT_MAX", DEFAULT_MAX_REQUESTS)?;

        let message = std::env::var("RATE_LIMIT_MESSAGE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)));

        Ok(Self {
            enabled: parse_env("RATE_LIMIT_ENABLED", false)?,
            window_ms: Some(window_ms),
            max: Some(max),
            message,
            trust_proxy: parse_env("RATE_LIMIT_TRUST_PROXY", false)?,
        })
    }

    /// A configuration that never limits
    pub fn disabled() -> Self {
        Self::default()
    }

    /// An enabled configuration with the given capacity and window
    pub fn enabled(max: u32, window_ms: u64) -> Self {
        Self {
            enabled: true,
            window_ms: Some(window_ms),
            max: Some(max),
            message: None,
            trust_proxy: false,
        }
    }

    /// Builder method to set a custom limit message
    pub fn with_message(mut self, message: Value) -> Self {
        self.message = Some(message);
        self
    }

    /// Builder method to key clients on forwarding headers
    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    /// Effective window length; zero falls back to the default
    pub fn window_ms(&self) -> u64 {
        self.window_ms
            .filter(|&ms| ms > 0)
            .unwrap_or(DEFAULT_WINDOW_MS)
    }

    /// Effective request capacity per window
    pub fn max_requests(&self) -> u32 {
        self.max.unwrap_or(DEFAULT_MAX_REQUESTS)
    }

    /// Milliseconds a limited client is told to wait
    pub fn retry_after_ms(&self) -> u64 {
        self.window_ms() + RETRY_AFTER_EXTRA_MS
    }

    /// Body returned to limited clients
    pub fn limit_message(&self) -> Value {
        match &self.message {
            Some(message) => message.clone(),
            None => json!({
                "errcode": "M_LIMIT_EXCEEDED",
                "error": "Too many requests",
                "retry_after_ms": self.retry_after_ms(),
            }),
        }
    }
}
