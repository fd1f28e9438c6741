//! Typed, layered configuration for the Portcullis gateway.
//!
//! Configuration is built in layers (defaults or an environment preset, then
//! TOML/JSON files, then environment variables) and validated once at the
//! end. Every section rejects unknown fields.
//!
//! # Example
//!
//! ```no_run
//! use portcullis_config::{ConfigLoader, Environment};
//!
//! # fn main() -> Result<(), portcullis_config::ConfigError> {
//! let environment = Environment::from_env()?;
//! let config = ConfigLoader::new()
//!     .with_environment(environment)
//!     .with_optional_file(environment.config_file())?
//!     .with_env_prefix("PORTCULLIS")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//! request_timeout_ms = 30000
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [auth]
//! token_header = "xrf-auth-token"
//!
//! [[auth.exemptions]]
//! path = "/health"
//! method = "ANY"
//!
//! [user_api]
//! base_url = "http://users.internal:8000"
//!
//! [account_rpc]
//! address = "accounts.internal:443"
//! ca_cert_path = "/etc/portcullis/ca.pem"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Scalar values can be overridden with `PREFIX__SECTION__KEY`:
//!
//! - `PORTCULLIS__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `PORTCULLIS__LOGGING__FORMAT=pretty`
//! - `PORTCULLIS__USER_API__DEFAULT_HEADERS__X_CLIENT_ID=gateway`

#![warn(missing_docs)]

mod config;
mod environment;
mod error;
mod loader;
mod schema;

pub use config::GatewayConfig;
pub use environment::{Environment, ENVIRONMENT_VAR};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use portcullis_telemetry::LogFormat;
pub use schema::*;
