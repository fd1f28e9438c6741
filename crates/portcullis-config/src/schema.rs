//! Configuration sections.

use portcullis_telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// HTTP server settings.
///
/// # Example
///
/// ```
/// use portcullis_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.request_timeout().as_secs(), 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// How long in-flight connections get to finish on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Deadline for the whole request, downstream calls included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Deadline for reading the request body.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

impl ServerConfig {
    /// Graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Per-request deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Body read timeout.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

const fn default_shutdown_timeout() -> u64 {
    30
}

const fn default_request_timeout() -> u64 {
    30_000
}

const fn default_read_timeout() -> u64 {
    10_000
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive (e.g., "info", "portcullis_rpc=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Append to this file instead of stdout.
    #[serde(default)]
    pub output_file: Option<PathBuf>,

    /// Include file and line in events.
    #[serde(default)]
    pub include_location: bool,
}

impl LoggingConfig {
    /// Converts to the telemetry crate's settings.
    #[must_use]
    pub fn to_log_config(&self) -> portcullis_telemetry::LogConfig {
        portcullis_telemetry::LogConfig {
            enabled: true,
            level: self.level.clone(),
            format: self.format,
            output_file: self.output_file.clone(),
            include_location: self.include_location,
            include_target: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Json,
            output_file: None,
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

const fn default_true() -> bool {
    true
}

/// One route that skips authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RouteExemption {
    /// Exact request path.
    pub path: String,
    /// HTTP method, or `ANY`.
    pub method: String,
}

impl RouteExemption {
    /// Creates an exemption.
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Request header carrying the auth token.
    #[serde(default = "default_token_header")]
    pub token_header: String,

    /// Routes that skip authentication.
    #[serde(default = "default_exemptions")]
    pub exemptions: Vec<RouteExemption>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_header: default_token_header(),
            exemptions: default_exemptions(),
        }
    }
}

fn default_token_header() -> String {
    "xrf-auth-token".to_string()
}

fn default_exemptions() -> Vec<RouteExemption> {
    vec![
        RouteExemption::new("/health", "ANY"),
        RouteExemption::new("/metrics", "GET"),
        RouteExemption::new("/api/v1/user", "POST"),
        RouteExemption::new("/api/v1/auth", "POST"),
        RouteExemption::new("/api/v1/auth/token", "POST"),
    ]
}

/// User/auth HTTP backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UserApiConfig {
    /// Base URL, e.g. `http://users.internal:8000`.
    #[serde(default = "default_user_api_url")]
    pub base_url: String,

    /// Per-call timeout.
    #[serde(default = "default_user_api_timeout")]
    pub timeout_ms: u64,

    /// Headers sent with every call.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl UserApiConfig {
    /// Per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for UserApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_user_api_url(),
            timeout_ms: default_user_api_timeout(),
            default_headers: BTreeMap::new(),
        }
    }
}

fn default_user_api_url() -> String {
    "http://localhost:8000".to_string()
}

const fn default_user_api_timeout() -> u64 {
    10_000
}

/// Account RPC backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AccountRpcConfig {
    /// `host:port` of the account service.
    #[serde(default = "default_account_address")]
    pub address: String,

    /// PEM trust anchor. Plaintext when absent.
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,

    /// Server name checked against the certificate.
    #[serde(default)]
    pub tls_domain: Option<String>,

    /// Upper bound on establishing the connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Upper bound on one call, further capped by the request deadline.
    #[serde(default = "default_rpc_request_timeout")]
    pub request_timeout_ms: u64,
}

impl AccountRpcConfig {
    /// Connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Per-call timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for AccountRpcConfig {
    fn default() -> Self {
        Self {
            address: default_account_address(),
            ca_cert_path: None,
            tls_domain: None,
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_rpc_request_timeout(),
        }
    }
}

fn default_account_address() -> String {
    "localhost:9090".to_string()
}

const fn default_connect_timeout() -> u64 {
    5_000
}

const fn default_rpc_request_timeout() -> u64 {
    10_000
}
