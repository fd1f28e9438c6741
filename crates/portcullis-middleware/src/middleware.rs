//! Core middleware trait and the `Next` chain.
//!
//! A stage receives the mutable context, the request and a [`Next`] handle.
//! It either forwards by calling [`Next::run`] exactly once, or short-circuits
//! by returning its own response without calling it.
//!
//! # Example
//!
//! ```
//! use portcullis_middleware::{BoxFuture, Middleware, MiddlewareContext, Next, Request, Response};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             println!("took {:?}", ctx.elapsed());
//!             response
//!         })
//!     }
//! }
//! ```

use crate::context::MiddlewareContext;
use crate::types::{Request, Response};

pub use portcullis_core::BoxFuture;

/// A request interceptor.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once
/// - A stage that does not call it must return a complete response
/// - A stage never changes its position in the pipeline
pub trait Middleware: Send + Sync + 'static {
    /// Stable stage name, used in logs and tests.
    fn name(&self) -> &'static str;

    /// Processes the request, forwarding to `next` or short-circuiting.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The rest of the chain after the current stage.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

/// Terminal handler invoked once every stage has forwarded.
pub type Handler<'a> =
    Box<dyn FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a>;

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(Handler<'a>),
}

impl<'a> Next<'a> {
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    pub(crate) fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Invokes the next stage, or the handler at the end of the chain.
    ///
    /// Consumes `self`, so it can only be called once.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            NextInner::Chain { middleware, .. } => f
                .debug_struct("Next")
                .field("stage", &middleware.name())
                .finish(),
            NextInner::Handler(_) => f.debug_struct("Next").field("stage", &"handler").finish(),
        }
    }
}
