//! HTTP types used throughout the pipeline, and the JSON response builders.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use portcullis_core::{translate, DataEnvelope, ErrorBody, GatewayError, TraceId};
use serde::Serialize;

/// The HTTP request type used in the pipeline.
///
/// The body is collected before the pipeline runs.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building JSON responses.
pub trait ResponseExt {
    /// A response with the given status, content type and body.
    fn with_body(status: StatusCode, content_type: HeaderValue, body: Bytes) -> Response;

    /// `{ "code": <status>, "data": <data> }`.
    ///
    /// A payload that fails to serialize becomes a generic 500.
    fn json_data<T: Serialize>(status: StatusCode, data: T) -> Response;

    /// `{ "code": <status>, "message": <message> }`.
    fn json_error(status: StatusCode, message: &str) -> Response;
}

impl ResponseExt for Response {
    fn with_body(status: StatusCode, content_type: HeaderValue, body: Bytes) -> Response {
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = status;
        response.headers_mut().insert(CONTENT_TYPE, content_type);
        response
    }

    fn json_data<T: Serialize>(status: StatusCode, data: T) -> Response {
        match DataEnvelope::new(status.as_u16(), data).to_bytes() {
            Ok(body) => Self::with_body(status, HeaderValue::from_static("application/json"), body),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response payload");
                Self::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    portcullis_core::GENERIC_ERROR_MESSAGE,
                )
            }
        }
    }

    fn json_error(status: StatusCode, message: &str) -> Response {
        let body = ErrorBody {
            code: status.as_u16(),
            message: message.to_string(),
        };
        Self::with_body(
            status,
            HeaderValue::from_static("application/json"),
            body.to_bytes(),
        )
    }
}

/// Renders a [`GatewayError`] through the translator.
///
/// Server-side faults are logged here with the full cause chain; the client
/// only ever receives the translated envelope.
pub fn error_response(trace_id: TraceId, err: &GatewayError) -> Response {
    let envelope = translate(err);
    if envelope.status.is_server_error() {
        tracing::error!(
            trace_id = %trace_id,
            status = envelope.status.as_u16(),
            error = ?err,
            "request failed"
        );
    } else {
        tracing::debug!(
            trace_id = %trace_id,
            status = envelope.status.as_u16(),
            error = %err,
            "request rejected"
        );
    }
    Response::json_error(envelope.status, &envelope.message)
}
