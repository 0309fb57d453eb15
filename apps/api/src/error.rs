//! Matrix-style error responses for the Gatekeeper middleware
//!
//! Every request the middleware chain refuses is answered with one of these
//! errors. Bodies are self-contained JSON objects carrying a stable
//! `errcode`, rendered through Axum's IntoResponse trait.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Matrix error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., M_MISSING_TOKEN)
    pub errcode: &'static str,
    /// Human-readable error message
    pub error: String,
    /// Only sent with M_UNKNOWN_TOKEN
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_logout: Option<bool>,
}

/// Errors the middleware chain answers requests with
#[derive(Error, Debug)]
pub enum MatrixError {
    // ========== Authentication ==========
    /// No access token in the header or query string
    #[error("Missing access token")]
    MissingToken,

    /// The home server does not know the token, or named no user for it
    #[error("Unrecognized access token")]
    UnknownToken,

    /// The home server could not be asked or gave an unusable answer
    #[error("Backend unreachable")]
    Backend,

    // ========== Request Body ==========
    /// A mutating request without a JSON object or array body
    #[error("No JSON submitted")]
    NotJson,

    /// The request body could not be buffered within the configured limit
    #[error("Request body too large")]
    TooLarge,

    // ========== Rate Limiting ==========
    /// The client used up its requests for the current window
    #[error("Too many requests")]
    LimitExceeded {
        /// Time until the client's window resets
        retry_after: Duration,
        /// Body sent to the client
        message: Value,
    },
}

impl MatrixError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::UnknownToken => StatusCode::FORBIDDEN,
            Self::Backend => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotJson => StatusCode::BAD_REQUEST,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::LimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Get the Matrix `errcode` for this error
    pub fn errcode(&self) -> &'static str {
        match self {
            Self::MissingToken => "M_MISSING_TOKEN",
            Self::UnknownToken => "M_UNKNOWN_TOKEN",
            Self::Backend => "M_UNKNOWN",
            Self::NotJson => "M_NOT_JSON",
            Self::TooLarge => "M_TOO_LARGE",
            Self::LimitExceeded { .. } => "M_LIMIT_EXCEEDED",
        }
    }

    /// Log the error with appropriate severity based on status code
    pub fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                errcode = self.errcode(),
                status = status.as_u16(),
                "Server error occurred"
            );
        } else if let Self::LimitExceeded { retry_after, .. } = self {
            tracing::warn!(
                errcode = self.errcode(),
                status = status.as_u16(),
                retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                "Request rate limited"
            );
        } else {
            tracing::debug!(
                error = %self,
                errcode = self.errcode(),
                status = status.as_u16(),
                "Request refused"
            );
        }
    }

    fn body(&self) -> ErrorResponse {
        ErrorResponse {
            errcode: self.errcode(),
            error: self.to_string(),
            soft_logout: matches!(self, Self::UnknownToken).then_some(false),
        }
    }
}

/// Whole seconds a client should wait, rounded up and never zero
fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1000).max(1)
}

impl IntoResponse for MatrixError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();

        if let Self::LimitExceeded {
            retry_after,
            message,
        } = self
        {
            let retry_header = [(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            )];

            // A configured string message is sent as-is, not as a JSON string
            return match message {
                Value::String(text) => (status, retry_header, text).into_response(),
                other => (status, retry_header, Json(other)).into_response(),
            };
        }

        (status, Json(self.body())).into_response()
    }
}
