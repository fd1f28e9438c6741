//! Authentication stage.
//!
//! The innermost stage. For routes outside the [`RouteExemptions`] set it:
//!
//! 1. reads the token from the configured header (missing or empty: 401)
//! 2. asks the [`TokenVerifier`] for the caller's identity (error: 401)
//! 3. rejects the request when no identity comes back (401)
//! 4. attaches the identity to the context and forwards
//!
//! A rejected request never reaches the handler.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{error_response, Request, Response};
use http::Method;
use portcullis_core::{translate, GatewayError, GatewayResult, IdentityContext, RequestContext};
use portcullis_telemetry::metrics;
use std::collections::HashSet;
use std::sync::Arc;

/// Header carrying the auth token unless configured otherwise.
pub const DEFAULT_TOKEN_HEADER: &str = "xrf-auth-token";

/// Method wildcard in the exemption table.
pub const ANY_METHOD: &str = "ANY";

const INVALID_TOKEN_MESSAGE: &str = "invalid auth token";

/// Verifies an auth token and resolves the caller.
///
/// `Ok(None)` means the token was well-formed but resolved to no caller.
pub trait TokenVerifier: Send + Sync + 'static {
    /// Verifies `token`, bounded by the request deadline in `ctx`.
    fn verify_token<'a>(
        &'a self,
        ctx: &'a RequestContext,
        token: &'a str,
    ) -> BoxFuture<'a, GatewayResult<Option<IdentityContext>>>;
}

/// Routes that skip authentication, keyed by exact path and method.
///
/// A method of `ANY` exempts every method on that path.
///
/// # Example
///
/// ```
/// use http::Method;
/// use portcullis_middleware::stages::RouteExemptions;
///
/// let exemptions = RouteExemptions::new()
///     .exempt("/health", "ANY")
///     .exempt("/api/v1/user", "POST");
///
/// assert!(exemptions.is_exempt("/health", &Method::DELETE));
/// assert!(exemptions.is_exempt("/api/v1/user", &Method::POST));
/// assert!(!exemptions.is_exempt("/api/v1/user", &Method::GET));
/// assert!(!exemptions.is_exempt("/api/v1/user/", &Method::POST));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteExemptions {
    routes: HashSet<(String, String)>,
}

impl RouteExemptions {
    /// Creates an empty set: every route requires authentication.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exemption. The method is matched case-insensitively.
    #[must_use]
    pub fn exempt(mut self, path: impl Into<String>, method: impl AsRef<str>) -> Self {
        self.insert(path, method);
        self
    }

    /// Adds an exemption in place.
    pub fn insert(&mut self, path: impl Into<String>, method: impl AsRef<str>) {
        self.routes
            .insert((path.into(), method.as_ref().to_ascii_uppercase()));
    }

    /// Returns `true` if `path` + `method` skips authentication.
    #[must_use]
    pub fn is_exempt(&self, path: &str, method: &Method) -> bool {
        self.contains(path, ANY_METHOD) || self.contains(path, method.as_str())
    }

    fn contains(&self, path: &str, method: &str) -> bool {
        self.routes
            .contains(&(path.to_string(), method.to_ascii_uppercase()))
    }

    /// Number of exempt entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if nothing is exempt.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<P: Into<String>, M: AsRef<str>> FromIterator<(P, M)> for RouteExemptions {
    fn from_iter<I: IntoIterator<Item = (P, M)>>(iter: I) -> Self {
        let mut exemptions = Self::new();
        for (path, method) in iter {
            exemptions.insert(path, method);
        }
        exemptions
    }
}

/// Outcome of the authentication stage, stored as a context extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The route is exempt; no token was checked.
    Exempt,
    /// The token was verified and the identity attached.
    Authenticated,
    /// The request was rejected.
    Rejected(RejectReason),
}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Header absent or empty.
    MissingToken,
    /// The verifier returned an error.
    VerifyFailed,
    /// The verifier resolved no identity.
    NoIdentity,
}

impl RejectReason {
    /// Metric label for this reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::VerifyFailed => "verify_failed",
            Self::NoIdentity => "no_identity",
        }
    }
}

/// The authentication stage.
pub struct AuthenticationMiddleware {
    verifier: Arc<dyn TokenVerifier>,
    exemptions: RouteExemptions,
    token_header: String,
}

impl AuthenticationMiddleware {
    /// Creates the stage with the default token header.
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>, exemptions: RouteExemptions) -> Self {
        Self {
            verifier,
            exemptions,
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
        }
    }

    /// Reads the token from `header` instead.
    #[must_use]
    pub fn with_token_header(mut self, header: impl Into<String>) -> Self {
        self.token_header = header.into();
        self
    }

    /// Returns the token header name.
    #[must_use]
    pub fn token_header(&self) -> &str {
        &self.token_header
    }

    /// Returns the exemption table.
    #[must_use]
    pub const fn exemptions(&self) -> &RouteExemptions {
        &self.exemptions
    }

    fn reject(
        ctx: &mut MiddlewareContext,
        reason: RejectReason,
        err: &GatewayError,
    ) -> Response {
        metrics::record_auth_rejection(reason.as_str());
        ctx.set_extension(AuthOutcome::Rejected(reason));
        error_response(ctx.trace_id(), err)
    }
}

impl std::fmt::Debug for AuthenticationMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationMiddleware")
            .field("exemptions", &self.exemptions)
            .field("token_header", &self.token_header)
            .finish_non_exhaustive()
    }
}

impl Middleware for AuthenticationMiddleware {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if self
                .exemptions
                .is_exempt(request.uri().path(), request.method())
            {
                ctx.set_extension(AuthOutcome::Exempt);
                return next.run(ctx, request).await;
            }

            let token = request
                .headers()
                .get(self.token_header.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
            if token.is_empty() {
                return Self::reject(
                    ctx,
                    RejectReason::MissingToken,
                    &GatewayError::unauthenticated(INVALID_TOKEN_MESSAGE),
                );
            }

            let verified = self
                .verifier
                .verify_token(ctx.request_context(), &token)
                .await;
            let identity = match verified {
                Ok(Some(identity)) => identity,
                Ok(None) => {
                    return Self::reject(
                        ctx,
                        RejectReason::NoIdentity,
                        &GatewayError::unauthenticated(INVALID_TOKEN_MESSAGE),
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        trace_id = %ctx.trace_id(),
                        error = %err,
                        "token verification failed"
                    );
                    let message = translate(&err).message;
                    return Self::reject(
                        ctx,
                        RejectReason::VerifyFailed,
                        &GatewayError::unauthenticated(message),
                    );
                }
            };

            tracing::debug!(
                trace_id = %ctx.trace_id(),
                user = %identity.log_id(),
                "request authenticated"
            );
            ctx.set_identity(identity);
            ctx.set_extension(AuthOutcome::Authenticated);
            next.run(ctx, request).await
        })
    }
}
