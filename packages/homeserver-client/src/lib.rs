//! Matrix home-server identity client for Gatekeeper
//!
//! This crate resolves an access token to a Matrix user ID by asking the
//! home server who the token belongs to:
//! - `GET /_matrix/client/r0/account/whoami` with the token as a bearer credential
//! - one attempt per call, no caching of results
//!
//! # Example
//!
//! ```rust,no_run
//! use gatekeeper_homeserver_client::HomeserverClient;
//! use gatekeeper_shared_config::HomeserverConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HomeserverClient::new(&HomeserverConfig::with_url("https://matrix.example.org"))?;
//!
//! match client.whoami("syt_token").await? {
//!     Some(user_id) => println!("token belongs to {}", user_id),
//!     None => println!("home server did not name a user"),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::HomeserverClient;
pub use error::{HomeserverError, HomeserverResult, UNKNOWN_TOKEN_ERRCODE};
pub use models::MatrixErrorBody;
