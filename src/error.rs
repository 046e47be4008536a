//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type. Whole-batch failures surface
//! to the front door as a structured JSON error; per-event failures
//! ([`RelayError::Dispatch`]) are logged and counted by the batch instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::pipeline::normalizer::NormalizationError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "feed format error: activities is not an array",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Relay error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category       | HTTP Status               |
/// |-----------|----------------|---------------------------|
/// | 1000–1999 | Input shape    | 400 Bad Request           |
/// | 3000–3999 | Infrastructure | 500 Internal Server Error |
/// | 5000–5999 | Delivery       | 502 Bad Gateway           |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Upstream payload has the wrong top-level shape.
    #[error("feed format error: {0}")]
    FeedFormat(String),

    /// A record in the batch is missing required fields.
    #[error("normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    /// Webhook action is not a recognized sale kind.
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// Ledger, metadata service or upstream feed unreachable.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// Notification sink rejected or failed a delivery.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::FeedFormat(_) => 1001,
            Self::Normalization(_) => 1002,
            Self::UnsupportedAction(_) => 1003,
            Self::Internal(_) => 3000,
            Self::Infrastructure(_) => 3001,
            Self::Config(_) => 3002,
            Self::Dispatch(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::FeedFormat(_) | Self::Normalization(_) | Self::UnsupportedAction(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Infrastructure(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Dispatch(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns `true` if retrying the whole batch on the next trigger is
    /// safe and expected to help.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }
}

impl From<sqlx::Error> for RelayError {
    fn from(e: sqlx::Error) -> Self {
        Self::Infrastructure(format!("ledger: {e}"))
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        } else {
            tracing::warn!(error = %self, code = self.error_code(), "request rejected");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
