//! # Portcullis Middleware
//!
//! The request dispatch pipeline wrapped around the gateway's router.
//!
//! ```text
//! Request → Logging → Authentication → Handler
//!              ↓            ↓
//!          trace id    identity or 401
//! ```
//!
//! | Stage | Middleware     | Purpose                                             |
//! |-------|----------------|-----------------------------------------------------|
//! | 1     | Logging        | Trace id, request/response events, latency metrics  |
//! | 2     | Authentication | Verify the auth token, attach the caller's identity |
//!
//! Every request is logged, including those authentication rejects. Only
//! authenticated requests, or requests to exempt routes, reach the handler.
//!
//! ## Example
//!
//! ```
//! use portcullis_middleware::{stages::LoggingMiddleware, Pipeline};
//!
//! let pipeline = Pipeline::builder().logging(LoggingMiddleware::new()).build();
//! assert_eq!(pipeline.stage_names(), vec!["logging"]);
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use context::MiddlewareContext;
pub use middleware::{BoxFuture, Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use types::{error_response, Request, Response, ResponseExt};
