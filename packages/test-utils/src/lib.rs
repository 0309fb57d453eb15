//! Shared test utilities for the Gatekeeper workspace
//!
//! This crate provides mock implementations of external services for testing
//! without network dependencies.
//!
//! # Mock Services
//!
//! - [`MockHomeserver`] - Mock Matrix home server answering whoami lookups
//!
//! # Example
//!
//! ```rust,ignore
//! use gatekeeper_test_utils::MockHomeserver;
//!
//! #[tokio::test]
//! async fn test_with_homeserver() {
//!     let homeserver = MockHomeserver::start().await;
//!     homeserver.mock_user("goodfox", "@fox:localhost").await;
//!
//!     // Use homeserver.url() to configure your client
//! }
//! ```

mod homeserver;

pub use homeserver::{MockHomeserver, WHOAMI_PATH};
