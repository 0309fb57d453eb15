//! Home-server client error types

use thiserror::Error;

/// `errcode` a home server uses for tokens it does not know
pub const UNKNOWN_TOKEN_ERRCODE: &str = "M_UNKNOWN_TOKEN";

/// Home-server client errors
#[derive(Error, Debug)]
pub enum HomeserverError {
    /// HTTP request failed before a response was read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A successful response carried a body that is not JSON
    #[error("failed to parse home server response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    /// The home server rejected the token as unknown
    #[error("home server does not recognize the access token")]
    UnknownToken,

    /// The home server answered with any other error status
    #[error("home server returned status {status}")]
    Status {
        status: u16,
        errcode: Option<String>,
    },
}

impl HomeserverError {
    /// Check if the home server reported the token as unknown
    ///
    /// Everything else means the home server could not give an answer.
    pub fn is_unknown_token(&self) -> bool {
        matches!(self, HomeserverError::UnknownToken)
    }
}

/// Result type for home-server operations
pub type HomeserverResult<T> = Result<T, HomeserverError>;
