//! Pipeline stages.
//!
//! 1. [`logging`] - Trace id, request/response events, latency metrics
//! 2. [`authentication`] - Token verification and identity attachment

pub mod authentication;
pub mod logging;

pub use authentication::{
    AuthOutcome, AuthenticationMiddleware, RejectReason, RouteExemptions, TokenVerifier,
    ANY_METHOD, DEFAULT_TOKEN_HEADER,
};
pub use logging::{LoggingMiddleware, ResponseLog, TRACE_ID_HEADER};
