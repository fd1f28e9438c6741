//! # Portcullis Core
//!
//! Core types shared by every Portcullis crate.
//!
//! - [`GatewayError`] - The error taxonomy every layer returns
//! - [`translate`] - Maps a [`GatewayError`] to the single user-visible [`ErrorEnvelope`]
//! - [`RequestContext`] - Per-request trace id, identity, deadline and remote address
//! - [`TraceId`] - Time-ordered request trace identifier
//! - [`IdentityContext`] - The authenticated caller attached by the authentication stage
//! - [`DataEnvelope`] / [`ErrorBody`] - The JSON shapes written to clients

#![doc(html_root_url = "https://docs.rs/portcullis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod envelope;
mod error;
mod identity;
mod translate;

pub use context::{RequestContext, TraceId};
pub use envelope::{DataEnvelope, ErrorBody};
pub use error::{GatewayError, GatewayResult, HttpClientError};
pub use identity::IdentityContext;
pub use translate::{translate, ErrorEnvelope, GENERIC_ERROR_MESSAGE};

use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future, used at the async trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
