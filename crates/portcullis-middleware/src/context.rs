//! Middleware context.
//!
//! [`MiddlewareContext`] wraps the [`RequestContext`] while the request moves
//! through the pipeline. Stages enrich the request context (trace id,
//! identity) and may leave typed extensions behind for later stages, the
//! handler or tests to inspect.

use portcullis_core::{IdentityContext, RequestContext, TraceId};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Duration;

/// Context that flows through the pipeline.
///
/// # Example
///
/// ```
/// use portcullis_core::IdentityContext;
/// use portcullis_middleware::MiddlewareContext;
///
/// let mut ctx = MiddlewareContext::default();
/// ctx.set_identity(IdentityContext::new("user-123", "device-a"));
///
/// let request_ctx = ctx.to_request_context();
/// assert_eq!(request_ctx.identity().unwrap().user_id, "user-123");
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    request: RequestContext,

    /// Type-erased data left by stages.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareContext {
    /// Wraps an existing request context.
    #[must_use]
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            extensions: HashMap::new(),
        }
    }

    /// Returns the request context.
    #[must_use]
    pub const fn request_context(&self) -> &RequestContext {
        &self.request
    }

    /// Returns the request context mutably.
    pub fn request_context_mut(&mut self) -> &mut RequestContext {
        &mut self.request
    }

    /// Returns an owned copy of the request context, for the handler.
    #[must_use]
    pub fn to_request_context(&self) -> RequestContext {
        self.request.clone()
    }

    /// Returns the trace id.
    #[must_use]
    pub const fn trace_id(&self) -> TraceId {
        self.request.trace_id()
    }

    /// Replaces the trace id.
    ///
    /// Only the logging stage should call this.
    pub fn set_trace_id(&mut self, trace_id: TraceId) {
        self.request.set_trace_id(trace_id);
    }

    /// Returns the authenticated identity, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&IdentityContext> {
        self.request.identity()
    }

    /// Attaches the authenticated identity.
    ///
    /// Only the authentication stage should call this. A second call is ignored.
    pub fn set_identity(&mut self, identity: IdentityContext) {
        self.request.set_identity(identity);
    }

    /// Returns the elapsed time since the request was accepted.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.request.elapsed()
    }

    /// Stores a typed extension value, replacing any previous one of that type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new(RequestContext::new())
    }
}

impl Clone for MiddlewareContext {
    fn clone(&self) -> Self {
        // Extensions are not Clone.
        Self {
            request: self.request.clone(),
            extensions: HashMap::new(),
        }
    }
}
