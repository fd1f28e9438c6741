//! # Portcullis Server
//!
//! The HTTP face of the Portcullis gateway: a hyper HTTP/1 server, the route
//! table, JSON body decoding, handlers and the processors that call the user
//! service (JSON/HTTP) and the account service (RPC).
//!
//! Every request runs through the same pipeline:
//!
//! ```text
//! accept → collect body → Logging → Authentication → Router → handler → processor
//! ```
//!
//! Responses are always JSON envelopes:
//!
//! ```json
//! { "code": 201, "data": { "accountId": "acc-1", "...": "..." } }
//! { "code": 404, "message": "route not found" }
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use portcullis_config::GatewayConfig;
//! use portcullis_server::{App, ShutdownSignal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), portcullis_server::ServerError> {
//!     let app = App::build(GatewayConfig::default()).await?;
//!     app.run(ShutdownSignal::with_os_signals()).await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
pub mod body;
mod error;
mod gateway;
mod handlers;
pub mod models;
pub mod processors;
mod router;
mod server;
mod shutdown;

pub use app::{dial_config, telemetry_config, user_api_client, App};
pub use error::ServerError;
pub use gateway::Gateway;
pub use handlers::Handlers;
pub use router::{Operation, Resolution, RouteMatch, Router};
pub use server::Server;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownReceiver, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
