//! Fixed-order middleware pipeline.
//!
//! ```text
//! Request → Logging → [extra stages] → Authentication → Handler
//! ```
//!
//! Logging is always outermost so every request is logged, including the
//! ones authentication rejects. Authentication is always innermost so only
//! authenticated requests reach a handler. The order is decided by the
//! builder, not by the order its methods are called in.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::{AuthenticationMiddleware, LoggingMiddleware};
use crate::types::{Request, Response};
use std::sync::Arc;

/// A type-erased stage.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The request dispatch pipeline.
///
/// Immutable once built and shared across all connections.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .authentication(AuthenticationMiddleware::new(verifier, exemptions))
///     .logging(LoggingMiddleware::new())
///     .build();
///
/// assert_eq!(pipeline.stage_names(), vec!["logging", "authentication"]);
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs the request through every stage and then `handler`.
    ///
    /// The handler only runs if every stage forwards.
    pub async fn process<H>(
        &self,
        mut ctx: MiddlewareContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(&mut ctx, request).await
    }

    /// Like [`process`](Self::process), also handing back the context so the
    /// extensions stages left behind can be inspected.
    pub async fn process_with_context<H>(
        &self,
        mut ctx: MiddlewareContext,
        request: Request,
        handler: H,
    ) -> (Response, MiddlewareContext)
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let response = self.build_chain(handler).run(&mut ctx, request).await;
        (response, ctx)
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the stage names, outermost first.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    logging: Option<BoxedMiddleware>,
    extra: Vec<BoxedMiddleware>,
    authentication: Option<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the outermost logging stage.
    #[must_use]
    pub fn logging(mut self, middleware: LoggingMiddleware) -> Self {
        self.logging = Some(Arc::new(middleware));
        self
    }

    /// Sets the innermost authentication stage.
    #[must_use]
    pub fn authentication(mut self, middleware: AuthenticationMiddleware) -> Self {
        self.authentication = Some(Arc::new(middleware));
        self
    }

    /// Adds a stage that runs after logging and before authentication.
    ///
    /// Extra stages run in the order they are added.
    #[must_use]
    pub fn add_stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.extra.push(Arc::new(middleware));
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        let stages = self
            .logging
            .into_iter()
            .chain(self.extra)
            .chain(self.authentication)
            .collect();
        Pipeline { stages }
    }
}
