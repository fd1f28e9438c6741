//! Error translation.
//!
//! [`translate`] turns any [`GatewayError`] into the one status and message
//! pair a client sees. Classification is structural, never based on message
//! text, and the first matching rule wins:
//!
//! 1. `Validation` - its own status if >= 400, otherwise 500
//! 2. `Internal` - 500 unless the fault carries its own status
//! 3. `Rpc` - `NotFound` 404, `AlreadyExists` 409, `InvalidArgument` 400, anything else 502
//! 4. `Http` - upstream 5xx becomes 502; 400, 401, 403, 404, 409, 422 pass through; other codes become 500
//! 5. `Unauthenticated` - 401
//! 6. `Other` - the cause chain is searched for a classifiable fault, else 500 with
//!    [`GENERIC_ERROR_MESSAGE`]

use http::StatusCode;
use tonic::Code;

use crate::envelope::ErrorBody;
use crate::error::{GatewayError, HttpClientError};

/// Message rendered for every unclassified failure.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

/// Message rendered when an upstream RPC fails with a status the gateway does not map.
const UPSTREAM_RPC_MESSAGE: &str = "upstream service error";

/// Downstream HTTP statuses the gateway passes through unchanged.
const PASS_THROUGH_HTTP: [StatusCode; 6] = [
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
    StatusCode::NOT_FOUND,
    StatusCode::CONFLICT,
    StatusCode::UNPROCESSABLE_ENTITY,
];

/// The user-visible result of translating an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    /// HTTP status to respond with.
    pub status: StatusCode,
    /// Message safe to show to the client.
    pub message: String,
}

impl ErrorEnvelope {
    /// Creates a new envelope.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The envelope rendered for unclassified failures.
    #[must_use]
    pub fn generic() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR_MESSAGE)
    }

    /// Returns the JSON body for this envelope.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.status.as_u16(),
            message: self.message.clone(),
        }
    }
}

/// Maps an error to its user-visible status and message.
///
/// # Example
///
/// ```
/// use portcullis_core::{translate, GatewayError};
///
/// let err = GatewayError::from(tonic::Status::already_exists("account exists"));
/// let envelope = translate(&err);
/// assert_eq!(envelope.status.as_u16(), 409);
/// assert_eq!(envelope.message, "account exists");
/// ```
#[must_use]
pub fn translate(error: &GatewayError) -> ErrorEnvelope {
    match error {
        GatewayError::Validation { message, status } => {
            let status = StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.as_u16() >= 400)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            ErrorEnvelope::new(status, message.clone())
        }
        GatewayError::Internal {
            message, status, ..
        } => ErrorEnvelope::new(
            status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message.clone(),
        ),
        GatewayError::Rpc(status) => translate_rpc(status),
        GatewayError::Http(err) => translate_http(err),
        GatewayError::Unauthenticated { message } => {
            ErrorEnvelope::new(StatusCode::UNAUTHORIZED, message.clone())
        }
        GatewayError::Other(err) => translate_unclassified(err),
    }
}

fn translate_rpc(status: &tonic::Status) -> ErrorEnvelope {
    let mapped = match status.code() {
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        _ => return ErrorEnvelope::new(StatusCode::BAD_GATEWAY, UPSTREAM_RPC_MESSAGE),
    };

    let message = if status.message().is_empty() {
        status.code().description().to_string()
    } else {
        status.message().to_string()
    };
    ErrorEnvelope::new(mapped, message)
}

fn translate_http(err: &HttpClientError) -> ErrorEnvelope {
    let status = if err.status.is_server_error() {
        StatusCode::BAD_GATEWAY
    } else if PASS_THROUGH_HTTP.contains(&err.status) {
        err.status
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let message = if err.message.is_empty() {
        "internal server error".to_string()
    } else {
        err.message.clone()
    };
    ErrorEnvelope::new(status, message)
}

fn translate_unclassified(err: &anyhow::Error) -> ErrorEnvelope {
    for cause in err.chain() {
        if let Some(inner) = cause.downcast_ref::<GatewayError>() {
            return translate(inner);
        }
        if let Some(status) = cause.downcast_ref::<tonic::Status>() {
            return translate_rpc(status);
        }
        if let Some(http) = cause.downcast_ref::<HttpClientError>() {
            return translate_http(http);
        }
    }
    ErrorEnvelope::generic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use proptest::prelude::*;

    fn status_of(error: &GatewayError) -> u16 {
        translate(error).status.as_u16()
    }

    #[test]
    fn test_validation_uses_own_status() {
        let err = GatewayError::validation_with_status("invalid currency", 422);
        let envelope = translate(&err);
        assert_eq!(envelope.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(envelope.message, "invalid currency");
    }

    #[test]
    fn test_validation_below_400_is_forced_to_500() {
        let err = GatewayError::validation_with_status("weird", 201);
        assert_eq!(status_of(&err), 500);

        let err = GatewayError::validation_with_status("weird", 0);
        assert_eq!(status_of(&err), 500);
    }

    #[test]
    fn test_internal_defaults_to_500_with_own_message() {
        let err = GatewayError::internal_with_source(
            "something went wrong",
            anyhow::anyhow!("seconds out of range"),
        );
        let envelope = translate(&err);
        assert_eq!(envelope.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message, "something went wrong");
        assert!(!envelope.message.contains("seconds"));
    }

    #[test]
    fn test_internal_with_status_override() {
        let err = GatewayError::internal_with_status(
            "account service unreachable",
            StatusCode::BAD_GATEWAY,
            anyhow::anyhow!("connection refused"),
        );
        assert_eq!(status_of(&err), 502);
    }

    #[test]
    fn test_rpc_code_mapping() {
        let cases = [
            (tonic::Status::not_found("x"), 404),
            (tonic::Status::already_exists("x"), 409),
            (tonic::Status::invalid_argument("x"), 400),
            (tonic::Status::internal("x"), 502),
            (tonic::Status::unavailable("x"), 502),
            (tonic::Status::permission_denied("x"), 502),
        ];
        for (status, expected) in cases {
            assert_eq!(status_of(&GatewayError::Rpc(status)), expected);
        }
    }

    #[test]
    fn test_rpc_already_exists_keeps_message() {
        let err = GatewayError::Rpc(tonic::Status::already_exists("account exists"));
        assert_eq!(
            translate(&err),
            ErrorEnvelope::new(StatusCode::CONFLICT, "account exists")
        );
    }

    #[test]
    fn test_rpc_unmapped_hides_upstream_message() {
        let err = GatewayError::Rpc(tonic::Status::internal("db password rejected"));
        let envelope = translate(&err);
        assert!(!envelope.message.contains("password"));
    }

    #[test]
    fn test_http_mapping() {
        let cases = [
            (StatusCode::SERVICE_UNAVAILABLE, 502),
            (StatusCode::INTERNAL_SERVER_ERROR, 502),
            (StatusCode::NOT_FOUND, 404),
            (StatusCode::CONFLICT, 409),
            (StatusCode::UNAUTHORIZED, 401),
            (StatusCode::IM_A_TEAPOT, 500),
            (StatusCode::TOO_MANY_REQUESTS, 500),
            (StatusCode::PERMANENT_REDIRECT, 500),
        ];
        for (upstream, expected) in cases {
            let err = GatewayError::Http(HttpClientError::new(
                upstream,
                "client error response",
                None,
            ));
            assert_eq!(status_of(&err), expected, "upstream {upstream}");
        }
    }

    #[test]
    fn test_unauthenticated_is_401() {
        let err = GatewayError::unauthenticated("invalid auth token");
        assert_eq!(
            translate(&err),
            ErrorEnvelope::new(StatusCode::UNAUTHORIZED, "invalid auth token")
        );
    }

    #[test]
    fn test_unclassified_is_generic() {
        let err = GatewayError::Other(anyhow::anyhow!("connection pool poisoned at 10.0.0.7"));
        let envelope = translate(&err);
        assert_eq!(envelope, ErrorEnvelope::generic());
    }

    #[test]
    fn test_unclassified_chain_is_searched() {
        let wrapped: anyhow::Error = Err::<(), _>(tonic::Status::already_exists("account exists"))
            .context("failed to create account")
            .unwrap_err();
        let envelope = translate(&GatewayError::Other(wrapped));
        assert_eq!(envelope, ErrorEnvelope::new(StatusCode::CONFLICT, "account exists"));
    }

    #[test]
    fn test_envelope_body() {
        let body = ErrorEnvelope::new(StatusCode::NOT_FOUND, "missing").to_body();
        assert_eq!(body.code, 404);
        assert_eq!(body.message, "missing");
    }

    proptest! {
        #[test]
        fn not_found_is_always_404(message in ".*") {
            let err = GatewayError::Rpc(tonic::Status::not_found(message));
            prop_assert_eq!(status_of(&err), 404);
        }

        #[test]
        fn unclassified_never_echoes_cause(message in "[a-zA-Z0-9 ]{1,64}") {
            let err = GatewayError::Other(anyhow::anyhow!("{message}"));
            let envelope = translate(&err);
            prop_assert_eq!(envelope.status, StatusCode::INTERNAL_SERVER_ERROR);
            prop_assert_eq!(envelope.message, GENERIC_ERROR_MESSAGE);
        }
    }
}
