//! Request context types.
//!
//! The [`RequestContext`] is created by the server for every inbound request
//! and handed explicitly to middleware, handlers, processors and downstream
//! clients. It carries the trace id, the authenticated identity and the
//! deadline that bounds all downstream work.

use crate::identity::IdentityContext;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A request-scoped trace identifier, using UUID v7.
///
/// UUID v7 combines a millisecond timestamp with random bits, so ids are
/// unique, time-ordered and cheap to generate.
///
/// # Example
///
/// ```
/// use portcullis_core::TraceId;
///
/// let id = TraceId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Creates a new trace id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TraceId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Per-request state threaded through every layer of the gateway.
///
/// The identity is attached at most once, by the authentication stage.
/// The deadline is fixed when the request is accepted and every downstream
/// call (RPC, HTTP, token verification) is bounded by [`remaining`](Self::remaining).
///
/// # Example
///
/// ```
/// use portcullis_core::{IdentityContext, RequestContext};
/// use std::time::Duration;
///
/// let ctx = RequestContext::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_identity(IdentityContext::new("user-1", "device-a"));
///
/// assert!(ctx.is_authenticated());
/// assert!(ctx.remaining().unwrap() <= Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    trace_id: TraceId,
    identity: Option<IdentityContext>,
    deadline: Option<Instant>,
    remote_addr: Option<SocketAddr>,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context with a fresh trace id and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_trace_id(TraceId::new())
    }

    /// Creates a context with the given trace id.
    #[must_use]
    pub fn with_trace_id(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            identity: None,
            deadline: None,
            remote_addr: None,
            started_at: Instant::now(),
        }
    }

    /// Returns the trace id.
    #[must_use]
    pub const fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Replaces the trace id.
    pub fn set_trace_id(&mut self, trace_id: TraceId) {
        self.trace_id = trace_id;
    }

    /// Returns the authenticated identity, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&IdentityContext> {
        self.identity.as_ref()
    }

    /// Returns `true` once an identity has been attached.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Attaches the authenticated identity.
    ///
    /// An identity that is already attached is kept.
    pub fn set_identity(&mut self, identity: IdentityContext) {
        if self.identity.is_none() {
            self.identity = Some(identity);
        }
    }

    /// Returns a context with the given identity attached.
    #[must_use]
    pub fn with_identity(mut self, identity: IdentityContext) -> Self {
        self.set_identity(identity);
        self
    }

    /// Returns the deadline, if one was set.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets an absolute deadline.
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Returns a context whose deadline is at most `timeout` from now.
    ///
    /// An earlier existing deadline is kept.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(self.deadline.map_or(candidate, |d| d.min(candidate)));
        self
    }

    /// Time left before the deadline.
    ///
    /// `None` means no deadline; `Some(Duration::ZERO)` means it has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Caps `timeout` by the time left before the deadline.
    #[must_use]
    pub fn bounded(&self, timeout: Duration) -> Duration {
        self.remaining().map_or(timeout, |left| left.min(timeout))
    }

    /// Returns the peer address of the inbound connection.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns a context with the given peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Returns the elapsed time since the request was accepted.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
