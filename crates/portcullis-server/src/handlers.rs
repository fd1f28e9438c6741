//! Route handlers.
//!
//! A handler decodes the request, calls its processor and wraps the result
//! in a `{ code, data }` envelope. Errors are returned to the caller, which
//! renders them through the translator.

use std::sync::Arc;

use bytes::Bytes;
use http::header::HeaderValue;
use http::request::Parts;
use http::StatusCode;
use http_body_util::BodyExt;
use portcullis_core::{GatewayError, GatewayResult, IdentityContext, RequestContext};
use portcullis_middleware::{Request, Response, ResponseExt};

use crate::body::{decode_json, BodyRejection};
use crate::models::{AccountRequest, AuthRequest, HealthResponse, UserRequest};
use crate::processors::{AccountProcessor, AuthProcessor, UserProcessor};
use crate::router::{Operation, Resolution, RouteMatch, Router};

/// Everything a route needs, shared by all requests.
#[derive(Debug)]
pub struct Handlers {
    router: Router,
    auth: Arc<AuthProcessor>,
    users: UserProcessor,
    accounts: AccountProcessor,
    token_header: String,
}

impl Handlers {
    /// Creates the handler set.
    #[must_use]
    pub fn new(
        router: Router,
        auth: Arc<AuthProcessor>,
        users: UserProcessor,
        accounts: AccountProcessor,
        token_header: impl Into<String>,
    ) -> Self {
        Self {
            router,
            auth,
            users,
            accounts,
            token_header: token_header.into(),
        }
    }

    /// The route table.
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    /// Routes `request` and runs its handler.
    pub async fn handle(&self, ctx: &RequestContext, request: Request) -> GatewayResult<Response> {
        let (parts, body) = request.into_parts();
        if let Some(rejection) = parts.extensions.get::<BodyRejection>() {
            return Err(rejection.into_error());
        }

        let body = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_else(|never| match never {});

        let route = match self.router.resolve(&parts.method, parts.uri.path()) {
            Resolution::Matched(route) => route,
            Resolution::MethodNotAllowed => {
                return Err(GatewayError::validation_with_status(
                    "method not allowed",
                    StatusCode::METHOD_NOT_ALLOWED.as_u16(),
                ))
            }
            Resolution::NotFound => {
                return Err(GatewayError::validation_with_status(
                    "route not found",
                    StatusCode::NOT_FOUND.as_u16(),
                ))
            }
        };

        tracing::debug!(
            trace_id = %ctx.trace_id(),
            operation = %route.operation(),
            "dispatching"
        );

        match route.operation() {
            Operation::Health => Ok(health()),
            Operation::Metrics => metrics(),
            Operation::Authenticate => self.authenticate(ctx, &parts, &body).await,
            Operation::CreateUser => self.create_user(ctx, &parts, &body).await,
            Operation::GetUserProfile => self.get_user_profile(ctx, &parts, &route).await,
            Operation::CreateAccount => self.create_account(ctx, &parts, &body).await,
            Operation::FindAccount => self.find_account(ctx, &route).await,
        }
    }

    async fn authenticate(
        &self,
        ctx: &RequestContext,
        parts: &Parts,
        body: &Bytes,
    ) -> GatewayResult<Response> {
        let request: AuthRequest = decode_json(&parts.headers, body)?;
        let token = self.auth.authenticate(ctx, &request).await?;
        Ok(Response::json_data(StatusCode::CREATED, token))
    }

    async fn create_user(
        &self,
        ctx: &RequestContext,
        parts: &Parts,
        body: &Bytes,
    ) -> GatewayResult<Response> {
        let request: UserRequest = decode_json(&parts.headers, body)?;
        let user = self.users.create_user(ctx, &request).await?;
        Ok(Response::json_data(StatusCode::CREATED, user))
    }

    async fn get_user_profile(
        &self,
        ctx: &RequestContext,
        parts: &Parts,
        route: &RouteMatch,
    ) -> GatewayResult<Response> {
        let user_id = route.param("userId").unwrap_or_default();
        if user_id.is_empty() {
            return Err(GatewayError::validation("invalid user id"));
        }

        let token = parts
            .headers
            .get(self.token_header.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let profile = self.users.get_user_profile(ctx, user_id, token).await?;
        Ok(Response::json_data(StatusCode::OK, profile))
    }

    async fn create_account(
        &self,
        ctx: &RequestContext,
        parts: &Parts,
        body: &Bytes,
    ) -> GatewayResult<Response> {
        let request: AccountRequest = decode_json(&parts.headers, body)?;
        let caller = caller(ctx)?;
        let account = self.accounts.create_account(ctx, caller, &request).await?;
        Ok(Response::json_data(StatusCode::CREATED, account))
    }

    async fn find_account(&self, ctx: &RequestContext, route: &RouteMatch) -> GatewayResult<Response> {
        let account_id = route.param("accountId").unwrap_or_default();
        if account_id.is_empty() {
            return Err(GatewayError::validation("Account not found"));
        }

        let caller = caller(ctx)?;
        let account = self.accounts.find_account(ctx, caller, account_id).await?;
        Ok(Response::json_data(StatusCode::OK, account))
    }
}

fn health() -> Response {
    Response::json_data(StatusCode::OK, HealthResponse { health: true })
}

fn metrics() -> GatewayResult<Response> {
    let text = portcullis_telemetry::render_metrics()
        .ok_or_else(|| GatewayError::internal("metrics recorder is not installed"))?;
    Ok(Response::with_body(
        StatusCode::OK,
        HeaderValue::from_static("text/plain; version=0.0.4"),
        Bytes::from(text),
    ))
}

/// The authenticated caller. Account routes need a fingerprinted identity.
fn caller(ctx: &RequestContext) -> GatewayResult<&IdentityContext> {
    match ctx.identity() {
        Some(identity) if !identity.fingerprint.is_empty() => Ok(identity),
        _ => Err(GatewayError::Other(anyhow::anyhow!(
            "invalid user context object in context"
        ))),
    }
}
