//! # Portcullis RPC
//!
//! Outbound RPC connections for the gateway.
//!
//! - [`ConnectionRegistry`] - Creates connections lazily, reuses them while
//!   healthy and replaces them once shut down
//! - [`Dialer`] - Transport strategy injected into the registry:
//!   [`TonicDialer`] for the network, [`MemoryDialer`] for tests
//! - [`DialConfig`] / [`DialOptions`] - Connect timeout and TLS trust anchor
//! - [`AccountServiceClient`] / [`AppServiceClient`] - Typed clients over a connection
//!
//! ## Example
//!
//! ```no_run
//! use portcullis_core::RequestContext;
//! use portcullis_rpc::{AppServiceClient, ConnectionRegistry, DialConfig, TonicDialer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ConnectionRegistry::new(Arc::new(TonicDialer::new()));
//! let config = DialConfig::new().with_connect_timeout(Duration::from_secs(5));
//!
//! let conn = registry.get_or_create("account.internal:9090", &config).await?;
//! let health = AppServiceClient::new(conn)
//!     .check_health(&RequestContext::new().with_timeout(Duration::from_secs(2)))
//!     .await?;
//! println!("account service up: {}", health.is_up);
//!
//! registry.close_all();
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-rpc/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod account;
mod app;
mod client;
mod connection;
mod dialer;
mod error;
mod memory;
mod options;
#[allow(missing_docs)]
pub mod proto;
mod registry;

pub use account::{AccountService, AccountServiceClient};
pub use app::AppServiceClient;
pub use connection::{ConnectivityState, RpcConnection};
pub use dialer::{Dialer, TonicDialer};
pub use error::{BoxError, RegistryError};
pub use memory::{MemoryDialer, MemoryListener};
pub use options::{DialConfig, DialOptions};
pub use registry::ConnectionRegistry;
