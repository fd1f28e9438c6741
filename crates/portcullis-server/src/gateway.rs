//! Request dispatch: pipeline plus handlers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use portcullis_client::ApiClient;
use portcullis_config::GatewayConfig;
use portcullis_core::{GatewayError, RequestContext};
use portcullis_middleware::stages::{AuthenticationMiddleware, LoggingMiddleware, RouteExemptions};
use portcullis_middleware::{error_response, MiddlewareContext, Pipeline, Request, Response};
use portcullis_rpc::AccountService;

use crate::handlers::Handlers;
use crate::processors::{AccountProcessor, AuthProcessor, UserProcessor};
use crate::router::Router;

/// The assembled gateway, shared by every connection.
///
/// Each request gets a fresh [`RequestContext`] carrying the peer address
/// and the request deadline, then runs Logging, Authentication and the
/// route handler in that order.
#[derive(Debug, Clone)]
pub struct Gateway {
    pipeline: Arc<Pipeline>,
    handlers: Arc<Handlers>,
    request_timeout: Duration,
}

impl Gateway {
    /// Wires the gateway from configuration and its two backends.
    #[must_use]
    pub fn new(config: &GatewayConfig, users: ApiClient, accounts: Arc<dyn AccountService>) -> Self {
        let token_header = config.auth.token_header.clone();
        let auth = Arc::new(AuthProcessor::new(users.clone()));

        let exemptions: RouteExemptions = config
            .auth
            .exemptions
            .iter()
            .map(|e| (e.path.clone(), e.method.clone()))
            .collect();

        let pipeline = Pipeline::builder()
            .logging(LoggingMiddleware::new())
            .authentication(
                AuthenticationMiddleware::new(auth.clone(), exemptions)
                    .with_token_header(token_header.clone()),
            )
            .build();

        let handlers = Handlers::new(
            Router::gateway(config.metrics.enabled),
            auth,
            UserProcessor::new(users, token_header.clone()),
            AccountProcessor::new(accounts),
            token_header,
        );

        Self {
            pipeline: Arc::new(pipeline),
            handlers: Arc::new(handlers),
            request_timeout: config.server.request_timeout(),
        }
    }

    /// The dispatch pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Runs one request through the pipeline and its handler.
    ///
    /// Handler execution is bounded by the request deadline; running past it
    /// yields 504.
    pub async fn dispatch(&self, request: Request, remote_addr: Option<SocketAddr>) -> Response {
        let mut request_ctx = RequestContext::new().with_timeout(self.request_timeout);
        if let Some(addr) = remote_addr {
            request_ctx = request_ctx.with_remote_addr(addr);
        }

        let handlers = Arc::clone(&self.handlers);
        self.pipeline
            .process(
                MiddlewareContext::new(request_ctx),
                request,
                move |ctx, request| {
                    let ctx = ctx.to_request_context();
                    Box::pin(async move { run_handler(&handlers, &ctx, request).await })
                },
            )
            .await
    }
}

async fn run_handler(handlers: &Handlers, ctx: &RequestContext, request: Request) -> Response {
    let result = match ctx.remaining() {
        Some(left) => match tokio::time::timeout(left, handlers.handle(ctx, request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::internal_with_status(
                "request timed out",
                StatusCode::GATEWAY_TIMEOUT,
                anyhow::anyhow!("handler exceeded the request deadline"),
            )),
        },
        None => handlers.handle(ctx, request).await,
    };

    result.unwrap_or_else(|err| error_response(ctx.trace_id(), &err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyRejection;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use portcullis_middleware::stages::TRACE_ID_HEADER;
    use portcullis_core::{BoxFuture, GatewayResult};
    use portcullis_rpc::proto::account::{
        CreateAccountRequest, CreateAccountResponse, GetAccountRequest, GetAccountResponse,
    };
    use serde_json::Value;

    struct NoAccounts;

    impl AccountService for NoAccounts {
        fn create_account<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            _request: CreateAccountRequest,
        ) -> BoxFuture<'a, GatewayResult<CreateAccountResponse>> {
            Box::pin(async { Ok(CreateAccountResponse::default()) })
        }

        fn get_account<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            _request: GetAccountRequest,
        ) -> BoxFuture<'a, GatewayResult<GetAccountResponse>> {
            Box::pin(async { Ok(GetAccountResponse::default()) })
        }
    }

    fn gateway() -> Gateway {
        let users = ApiClient::builder("http://127.0.0.1:9").build().unwrap();
        Gateway::new(&GatewayConfig::default(), users, Arc::new(NoAccounts))
    }

    fn request(method: &str, path: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_exempt() {
        let response = gateway().dispatch(request("GET", "/health"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json(response).await,
            serde_json::json!({"code": 200, "data": {"health": true}})
        );
    }

    #[tokio::test]
    async fn test_protected_route_without_token() {
        let response = gateway()
            .dispatch(request("GET", "/api/v1/accounts/acc-1"), None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(response).await["message"], "invalid auth token");
    }

    #[tokio::test]
    async fn test_body_rejection_is_logged_and_traced() {
        let mut req = request("POST", "/api/v1/user");
        req.extensions_mut().insert(BodyRejection::TimedOut);

        let response = gateway().dispatch(req, None).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(response.headers().contains_key(TRACE_ID_HEADER));
        assert_eq!(json(response).await["message"], "request body read timed out");
    }

    #[tokio::test]
    async fn test_pipeline_order() {
        assert_eq!(
            gateway().pipeline().stage_names(),
            vec!["logging", "authentication"]
        );
    }
}
