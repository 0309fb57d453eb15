//! Rate limiting middleware for the Gatekeeper API
//!
//! Requests are counted per client IP in fixed windows: the first request
//! from a client opens a window of `window_ms`, and at most `max` requests
//! pass until that window has fully elapsed. Counters live in memory, per
//! instance.
//!
//! Clients are keyed on the connection's peer address. Forwarding headers
//! are only honored when the configuration trusts the proxy in front.
//!
//! A disabled configuration (or `max = 0`) installs no limiter at all.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use gatekeeper_shared_config::RateLimitConfig;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info_span, warn};

use crate::error::MatrixError;

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Minimum time between sweeps of expired windows
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One client's current window
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    window_start: Instant,
    count: u32,
}

impl WindowEntry {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }

    fn is_expired(&self, window: Duration, now: Instant) -> bool {
        now.duration_since(self.window_start) >= window
    }

    /// Count a request, opening a fresh window if the old one has elapsed
    ///
    /// Returns Ok(remaining) if allowed, Err(time until reset) if limited
    fn check_and_record(&mut self, max: u32, window: Duration, now: Instant) -> Result<u32, Duration> {
        if self.is_expired(window, now) {
            *self = Self::new(now);
        }

        if self.count < max {
            self.count += 1;
            Ok(max - self.count)
        } else {
            Err(window.saturating_sub(now.duration_since(self.window_start)))
        }
    }
}

/// In-memory fixed-window rate limiter
#[derive(Debug)]
pub struct FixedWindowLimiter {
    /// Map of client key -> current window
    entries: RwLock<HashMap<String, WindowEntry>>,
    max_requests: u32,
    window: Duration,
    last_sweep: RwLock<Instant>,
}

impl FixedWindowLimiter {
    /// Create a limiter allowing `max_requests` per `window` for each key
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_requests,
            window,
            last_sweep: RwLock::new(Instant::now()),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count a request for `key`
    ///
    /// Returns Ok(remaining) if allowed, Err(retry_after) if rate limited
    pub async fn check(&self, key: &str) -> Result<u32, Duration> {
        self.maybe_sweep().await;

        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry::new(now));

        let result = entry.check_and_record(self.max_requests, self.window, now);

        if let Ok(remaining) = &result {
            debug!(key = %key, remaining = remaining, "Rate limit check passed");
        }

        result
    }

    /// Drop expired windows so idle clients do not pile up
    async fn maybe_sweep(&self) {
        let interval = self.window.max(SWEEP_INTERVAL);

        {
            let last_sweep = self.last_sweep.read().await;
            if last_sweep.elapsed() < interval {
                return;
            }
        }

        let mut last_sweep = self.last_sweep.write().await;

        // Another request may have swept while we waited for the lock
        if last_sweep.elapsed() < interval {
            return;
        }

        *last_sweep = Instant::now();
        drop(last_sweep);

        self.sweep().await;
    }

    async fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let initial_count = entries.len();

        entries.retain(|_, entry| !entry.is_expired(self.window, now));

        let removed = initial_count - entries.len();
        if removed > 0 {
            debug!(
                removed = removed,
                remaining = entries.len(),
                "Swept expired rate limit windows"
            );
        }
    }

    /// Get the current number of tracked keys (for testing)
    #[cfg(test)]
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[derive(Debug)]
struct ActiveLimit {
    limiter: FixedWindowLimiter,
    message: Value,
    trust_proxy: bool,
}

/// State for the rate limiting middleware
///
/// Cheap to clone; clones share one set of counters.
#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    active: Option<Arc<ActiveLimit>>,
}

impl RateLimit {
    /// Build the limiter described by `config`
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled || config.max_requests() == 0 {
            return Self::disabled();
        }

        let limiter = FixedWindowLimiter::new(
            config.max_requests(),
            Duration::from_millis(config.window_ms()),
        );

        Self {
            active: Some(Arc::new(ActiveLimit {
                limiter,
                message: config.limit_message(),
                trust_proxy: config.trust_proxy,
            })),
        }
    }

    /// A pass-through limiter
    pub fn disabled() -> Self {
        Self { active: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// Count a request from `client`
    ///
    /// Returns Ok(None) when limiting is disabled, Ok(Some(remaining)) when
    /// the request passes.
    pub async fn check(&self, client: &str) -> Result<Option<u32>, MatrixError> {
        let Some(active) = &self.active else {
            return Ok(None);
        };

        active
            .limiter
            .check(client)
            .await
            .map(Some)
            .map_err(|retry_after| MatrixError::LimitExceeded {
                retry_after,
                message: active.message.clone(),
            })
    }

    fn max_requests(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.limiter.max_requests())
    }

    fn trusts_proxy(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.trust_proxy)
    }
}

/// Parse a header value as an IP address
fn header_ip(headers: &HeaderMap, name: &str, first_of_list: bool) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    let candidate = if first_of_list {
        value.split(',').next()?
    } else {
        value
    };

    let candidate = candidate.trim();
    candidate.parse::<IpAddr>().ok().map(|_| candidate.to_string())
}

/// Extract client IP from request headers or connection info
///
/// Order: the peer address, then `"unknown"`. With `trust_proxy` the first
/// `X-Forwarded-For` entry and then `X-Real-IP` come before the peer.
pub fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> String {
    if trust_proxy {
        if let Some(ip) = header_ip(headers, "x-forwarded-for", true) {
            return ip;
        }

        if let Some(ip) = header_ip(headers, "x-real-ip", false) {
            return ip;
        }
    }

    if let Some(ConnectInfo(addr)) = connect_info {
        return addr.ip().to_string();
    }

    warn!("Could not determine client IP for rate limiting");
    "unknown".to_string()
}

/// Middleware limiting requests per client IP
pub async fn rate_limit(
    State(limit): State<RateLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limit.is_enabled() {
        return next.run(request).await;
    }

    let client_ip = extract_client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        limit.trusts_proxy(),
    );

    match limit.check(&client_ip).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;

            if let (Some(max), Some(remaining)) = (limit.max_requests(), remaining) {
                let headers = response.headers_mut();
                headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(max));
                headers.insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(remaining));
            }

            response
        }
        Err(err) => {
            let _span = info_span!("rate_limit", ip = %client_ip).entered();
            err.into_response()
        }
    }
}
