//! Error types for Portcullis.
//!
//! [`GatewayError`] is the one error type handlers, processors and middleware
//! hand back. Each variant is a kind of fault, not a rendering decision: the
//! HTTP status and message a client sees are chosen afterwards by
//! [`translate`](crate::translate).
//!
//! | Variant | Fault |
//! |---|---|
//! | `Validation` | Caller-caused fault carrying its own status |
//! | `Unauthenticated` | Missing or rejected credentials |
//! | `Internal` | Server fault wrapping a lower-level cause |
//! | `Rpc` | Downstream RPC failure (`tonic::Status`) |
//! | `Http` | Downstream HTTP failure ([`HttpClientError`]) |
//! | `Other` | Anything not classified above |

use http::StatusCode;
use thiserror::Error;

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Standard error type for Portcullis.
///
/// # Example
///
/// ```
/// use portcullis_core::GatewayError;
///
/// fn require_currency(currency: &str) -> Result<(), GatewayError> {
///     if currency.is_empty() {
///         return Err(GatewayError::validation("currency is required"));
///     }
///     Ok(())
/// }
///
/// assert!(require_currency("").is_err());
/// ```
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Caller-caused fault (bad input, failed precondition).
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable error message, shown to the client.
        message: String,
        /// Status the fault asks for. Values below 400 are rendered as 500.
        status: u16,
    },

    /// Authentication failed or was not attempted.
    #[error("authentication error: {message}")]
    Unauthenticated {
        /// Human-readable error message, shown to the client.
        message: String,
    },

    /// Internal server fault.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable error message, shown to the client.
        message: String,
        /// Status override. `None` renders as 500.
        status: Option<StatusCode>,
        /// The underlying error (never exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A downstream RPC call failed.
    #[error("rpc error: {0}")]
    Rpc(#[from] tonic::Status),

    /// A downstream HTTP call returned an unsuccessful status.
    #[error(transparent)]
    Http(#[from] HttpClientError),

    /// Unclassified failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    /// Creates a validation error with status 400.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            status: StatusCode::BAD_REQUEST.as_u16(),
        }
    }

    /// Creates a validation error with an explicit status.
    #[must_use]
    pub fn validation_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Validation {
            message: message.into(),
            status,
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            status: None,
            source: Some(source.into()),
        }
    }

    /// Creates an internal error that renders with a status other than 500.
    pub fn internal_with_status(
        message: impl Into<String>,
        status: StatusCode,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            status: Some(status),
            source: Some(source.into()),
        }
    }

    /// Returns `true` for faults the caller caused.
    #[must_use]
    pub const fn is_client_fault(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Unauthenticated { .. })
    }
}

/// Failure reported by a downstream JSON/HTTP service.
///
/// The body is kept for server-side logging and never written to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("API error {status}: {message}")]
pub struct HttpClientError {
    /// Status returned by the downstream service.
    pub status: StatusCode,
    /// Summary of the failure.
    pub message: String,
    /// Raw response body, if one could be read.
    pub body: Option<String>,
}

impl HttpClientError {
    /// Creates an error for a non-success response.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, body: Option<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = GatewayError::validation("invalid currency");
        assert!(matches!(error, GatewayError::Validation { status: 400, .. }));
        assert!(error.to_string().contains("invalid currency"));
        assert!(error.is_client_fault());
    }

    #[test]
    fn test_internal_error_keeps_source() {
        let error = GatewayError::internal_with_source(
            "something went wrong",
            anyhow::anyhow!("timestamp out of range"),
        );
        let source = std::error::Error::source(&error).expect("source should be set");
        assert_eq!(source.to_string(), "timestamp out of range");
        assert!(!error.is_client_fault());
    }

    #[test]
    fn test_from_status() {
        let error: GatewayError = tonic::Status::not_found("no such account").into();
        assert!(matches!(error, GatewayError::Rpc(_)));
    }

    #[test]
    fn test_http_client_error_display() {
        let error = HttpClientError::new(
            StatusCode::CONFLICT,
            "client error response",
            Some("{\"error\":\"duplicate\"}".to_string()),
        );
        assert_eq!(error.to_string(), "API error 409 Conflict: client error response");
    }
}
