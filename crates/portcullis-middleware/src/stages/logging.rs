//! Request logging stage.
//!
//! The outermost stage. It:
//!
//! - assigns a fresh [`TraceId`] to the request
//! - emits a "request received" event (method, path, peer, user agent)
//! - echoes the trace id to the client in the `Request-Trace-Id` header
//! - emits a "response" event with status and latency, plus the response
//!   body when the status is 400 or above
//! - records request count and latency metrics
//!
//! The emitted response event is also stored in the context as a
//! [`ResponseLog`] extension.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use http::header::{HeaderName, HeaderValue, USER_AGENT};
use http_body_util::{BodyExt, Full};
use portcullis_core::TraceId;
use portcullis_telemetry::{fields, metrics};
use std::time::Duration;
use tracing::field::Empty;
use tracing::Instrument;

/// Response header carrying the request's trace id.
pub const TRACE_ID_HEADER: &str = "request-trace-id";

/// What the logging stage recorded about the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLog {
    /// The request's trace id.
    pub trace_id: TraceId,
    /// Final status code.
    pub status: u16,
    /// Time spent in the inner stages and the handler.
    pub duration: Duration,
    /// The response body, only for failed requests.
    pub error_body: Option<String>,
}

impl ResponseLog {
    /// Returns `true` if the response was a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.status >= 400
    }
}

/// The logging stage.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    _private: (),
}

impl LoggingMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        let trace_id = TraceId::new();
        ctx.set_trace_id(trace_id);

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let span = tracing::info_span!(
            "request",
            trace_id = %trace_id,
            http.method = %method,
            http.path = %path,
            http.status_code = Empty,
            duration_ms = Empty,
        );

        Box::pin(
            async move {
                let user_agent = request
                    .headers()
                    .get(USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let remote_addr = ctx
                    .request_context()
                    .remote_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_default();
                tracing::info!(
                    remote_addr = %remote_addr,
                    user_agent = %user_agent,
                    "request received"
                );

                let started = std::time::Instant::now();
                let response = next.run(ctx, request).await;
                let duration = started.elapsed();

                let status = response.status();
                let (mut response, error_body) = if status.as_u16() >= 400 {
                    let (response, body) = capture_body(response).await;
                    (response, Some(body))
                } else {
                    (response, None)
                };

                let span = tracing::Span::current();
                span.record(fields::HTTP_STATUS, status.as_u16());
                span.record(fields::DURATION_MS, duration_ms(duration));

                match &error_body {
                    Some(body) => tracing::error!(
                        success = false,
                        status = status.as_u16(),
                        duration_ms = duration_ms(duration),
                        error = %body,
                        "response"
                    ),
                    None => tracing::info!(
                        success = true,
                        status = status.as_u16(),
                        duration_ms = duration_ms(duration),
                        "response"
                    ),
                }

                if let Ok(value) = HeaderValue::from_str(&trace_id.to_string()) {
                    response
                        .headers_mut()
                        .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
                }

                metrics::record_request(method.as_str(), status.as_u16(), duration);
                ctx.set_extension(ResponseLog {
                    trace_id,
                    status: status.as_u16(),
                    duration,
                    error_body,
                });

                response
            }
            .instrument(span),
        )
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

async fn capture_body(response: Response) -> (Response, String) {
    let (parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };
    let text = String::from_utf8_lossy(&bytes).into_owned();
    (Response::from_parts(parts, Full::new(bytes)), text)
}
