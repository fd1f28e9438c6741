//! End-to-end pipeline tests: Logging wrapping Authentication wrapping a handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Request as HttpRequest, StatusCode};
use http_body_util::{BodyExt, Full};
use portcullis_core::{GatewayError, GatewayResult, IdentityContext, RequestContext, TraceId};
use portcullis_middleware::stages::{
    AuthOutcome, AuthenticationMiddleware, LoggingMiddleware, RejectReason, ResponseLog,
    RouteExemptions, TokenVerifier,
};
use portcullis_middleware::{
    BoxFuture, MiddlewareContext, Pipeline, Request, Response, ResponseExt,
};
use serde_json::{json, Value};

/// Resolves a fixed set of tokens and remembers the trace ids it saw.
#[derive(Default)]
struct StaticVerifier {
    seen: Mutex<Vec<TraceId>>,
}

impl TokenVerifier for StaticVerifier {
    fn verify_token<'a>(
        &'a self,
        ctx: &'a RequestContext,
        token: &'a str,
    ) -> BoxFuture<'a, GatewayResult<Option<IdentityContext>>> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(ctx.trace_id());
            match token {
                "good" => Ok(Some(IdentityContext::new("u-1", "fp-1"))),
                "expired" => Err(GatewayError::validation_with_status("token expired", 401)),
                _ => Ok(None),
            }
        })
    }
}

fn exemptions() -> RouteExemptions {
    RouteExemptions::new()
        .exempt("/health", "ANY")
        .exempt("/api/v1/user", "POST")
}

fn build_pipeline(verifier: Arc<StaticVerifier>) -> Pipeline {
    Pipeline::builder()
        .logging(LoggingMiddleware::new())
        .authentication(AuthenticationMiddleware::new(verifier, exemptions()))
        .build()
}

fn make_request(path: &str, method: &str, token: Option<&str>) -> Request {
    let mut builder = HttpRequest::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("xrf-auth-token", token);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

/// Runs the request through `pipeline` with a handler that records whether it
/// ran and echoes the caller's user id.
async fn dispatch(
    pipeline: &Pipeline,
    request: Request,
    status: StatusCode,
) -> (Response, MiddlewareContext, bool) {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let (response, ctx) = pipeline
        .process_with_context(MiddlewareContext::default(), request, move |ctx, _req| {
            flag.store(true, Ordering::SeqCst);
            let user = ctx.identity().map(|identity| identity.user_id.clone());
            Box::pin(async move {
                if status.is_success() {
                    Response::json_data(status, json!({ "user": user }))
                } else {
                    Response::json_error(status, "handler failed")
                }
            })
        })
        .await;
    (response, ctx, called.load(Ordering::SeqCst))
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_token_is_rejected_before_handler() {
    let pipeline = build_pipeline(Arc::new(StaticVerifier::default()));
    let (response, ctx, called) =
        dispatch(&pipeline, make_request("/api/v1/accounts/a-1", "GET", None), StatusCode::OK).await;

    assert!(!called);
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        ctx.get_extension::<AuthOutcome>(),
        Some(&AuthOutcome::Rejected(RejectReason::MissingToken))
    );
    assert!(response.headers().contains_key("request-trace-id"));
    assert_eq!(
        body_json(response).await,
        json!({"code": 401, "message": "invalid auth token"})
    );
}

#[tokio::test]
async fn empty_token_is_treated_as_missing() {
    let verifier = Arc::new(StaticVerifier::default());
    let pipeline = build_pipeline(Arc::clone(&verifier));
    let (response, ctx, called) = dispatch(
        &pipeline,
        make_request("/api/v1/accounts/a-1", "GET", Some("")),
        StatusCode::OK,
    )
    .await;

    assert!(!called);
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        ctx.get_extension::<AuthOutcome>(),
        Some(&AuthOutcome::Rejected(RejectReason::MissingToken))
    );
    assert!(verifier.seen.lock().unwrap().is_empty(), "verifier is never consulted");
}

#[tokio::test]
async fn exempt_route_reaches_handler_without_token() {
    let pipeline = build_pipeline(Arc::new(StaticVerifier::default()));

    for method in ["GET", "POST", "DELETE"] {
        let (response, ctx, called) =
            dispatch(&pipeline, make_request("/health", method, None), StatusCode::OK).await;
        assert!(called, "{method} /health is exempt");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.get_extension::<AuthOutcome>(), Some(&AuthOutcome::Exempt));
    }

    let (_, _, called) =
        dispatch(&pipeline, make_request("/api/v1/user", "POST", None), StatusCode::CREATED).await;
    assert!(called);
}

#[tokio::test]
async fn exemption_is_method_specific() {
    let pipeline = build_pipeline(Arc::new(StaticVerifier::default()));
    let (response, _, called) =
        dispatch(&pipeline, make_request("/api/v1/user", "GET", None), StatusCode::OK).await;
    assert!(!called);
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verified_identity_reaches_handler() {
    let verifier = Arc::new(StaticVerifier::default());
    let pipeline = build_pipeline(Arc::clone(&verifier));
    let (response, ctx, called) = dispatch(
        &pipeline,
        make_request("/api/v1/user/u-1", "GET", Some("good")),
        StatusCode::OK,
    )
    .await;

    assert!(called);
    assert_eq!(ctx.get_extension::<AuthOutcome>(), Some(&AuthOutcome::Authenticated));
    assert_eq!(ctx.identity().map(|i| i.fingerprint.as_str()), Some("fp-1"));

    // Logging runs first, so the verifier already sees the request's trace id.
    let trace_header = response
        .headers()
        .get("Request-Trace-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("trace id header");
    assert_eq!(verifier.seen.lock().unwrap().as_slice(), &[ctx.trace_id()]);
    assert_eq!(trace_header, ctx.trace_id().to_string());

    assert_eq!(body_json(response).await["data"]["user"], "u-1");
}

#[tokio::test]
async fn unresolved_token_is_rejected() {
    let pipeline = build_pipeline(Arc::new(StaticVerifier::default()));
    let (response, ctx, called) = dispatch(
        &pipeline,
        make_request("/api/v1/user/u-1", "GET", Some("unknown")),
        StatusCode::OK,
    )
    .await;

    assert!(!called);
    assert_eq!(
        ctx.get_extension::<AuthOutcome>(),
        Some(&AuthOutcome::Rejected(RejectReason::NoIdentity))
    );
    assert_eq!(body_json(response).await["message"], "invalid auth token");
}

#[tokio::test]
async fn verifier_error_is_propagated_as_401() {
    let pipeline = build_pipeline(Arc::new(StaticVerifier::default()));
    let (response, ctx, called) = dispatch(
        &pipeline,
        make_request("/api/v1/user/u-1", "GET", Some("expired")),
        StatusCode::OK,
    )
    .await;

    assert!(!called);
    assert_eq!(
        ctx.get_extension::<AuthOutcome>(),
        Some(&AuthOutcome::Rejected(RejectReason::VerifyFailed))
    );
    assert_eq!(
        body_json(response).await,
        json!({"code": 401, "message": "token expired"})
    );
}

#[tokio::test]
async fn rejected_requests_are_still_logged() {
    let pipeline = build_pipeline(Arc::new(StaticVerifier::default()));
    let (_, ctx, _) =
        dispatch(&pipeline, make_request("/api/v1/accounts/a-1", "GET", None), StatusCode::OK).await;

    let log = ctx.get_extension::<ResponseLog>().expect("logging stage ran");
    assert_eq!(log.status, 401);
    assert_eq!(
        log.error_body.as_deref(),
        Some(r#"{"code":401,"message":"invalid auth token"}"#)
    );
}

#[tokio::test]
async fn failure_log_carries_body_success_log_does_not() {
    let pipeline = build_pipeline(Arc::new(StaticVerifier::default()));

    let (_, ctx, _) = dispatch(
        &pipeline,
        make_request("/health", "GET", None),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .await;
    let log = ctx.get_extension::<ResponseLog>().unwrap();
    assert_eq!(log.status, 500);
    assert!(log.error_body.as_deref().unwrap().contains("handler failed"));

    let (_, ctx, _) = dispatch(&pipeline, make_request("/health", "GET", None), StatusCode::OK).await;
    let log = ctx.get_extension::<ResponseLog>().unwrap();
    assert_eq!(log.status, 200);
    assert!(log.error_body.is_none());
}

#[tokio::test]
async fn builder_fixes_stage_order() {
    let pipeline = Pipeline::builder()
        .authentication(AuthenticationMiddleware::new(
            Arc::new(StaticVerifier::default()),
            exemptions(),
        ))
        .logging(LoggingMiddleware::new())
        .build();

    assert_eq!(pipeline.stage_names(), vec!["logging", "authentication"]);
}

#[tokio::test]
async fn custom_token_header() {
    let pipeline = Pipeline::builder()
        .logging(LoggingMiddleware::new())
        .authentication(
            AuthenticationMiddleware::new(Arc::new(StaticVerifier::default()), exemptions())
                .with_token_header("x-token"),
        )
        .build();

    let request = HttpRequest::builder()
        .uri("/api/v1/user/u-1")
        .header("x-token", "good")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let (response, _, called) = dispatch(&pipeline, request, StatusCode::OK).await;
    assert!(called);
    assert_eq!(response.status(), StatusCode::OK);

    // The default header is no longer consulted.
    let (response, _, called) = dispatch(
        &pipeline,
        make_request("/api/v1/user/u-1", "GET", Some("good")),
        StatusCode::OK,
    )
    .await;
    assert!(!called);
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
