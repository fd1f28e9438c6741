//! Top-level gateway configuration.

use std::net::SocketAddr;

use portcullis_telemetry::LogFormat;
use serde::{Deserialize, Serialize};

use crate::{
    AccountRpcConfig, AuthConfig, ConfigError, Environment, LoggingConfig, MetricsConfig,
    ServerConfig, UserApiConfig,
};

/// Methods accepted in the exemption table.
const EXEMPTION_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "ANY"];

/// Complete gateway configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and environment
/// variables over the defaults.
///
/// # Example
///
/// ```
/// use portcullis_config::GatewayConfig;
///
/// let config = GatewayConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.auth.token_header, "xrf-auth-token");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// User/auth HTTP backend.
    #[serde(default)]
    pub user_api: UserApiConfig,

    /// Account RPC backend.
    #[serde(default)]
    pub account_rpc: AccountRpcConfig,
}

impl GatewayConfig {
    /// Preset for `environment`.
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        if environment.is_dev() {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Local development preset: pretty output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                include_location: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Deployed preset: JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `server.http_addr` is not a socket address or its request timeout is zero
    /// - `logging.level` is not a valid filter directive
    /// - `auth.token_header` is not a valid header name or an exemption names an
    ///   unknown method
    /// - `user_api.base_url` is not an http(s) URL
    /// - `account_rpc.address` is empty or its connect timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if let Err(e) = portcullis_telemetry::logging::create_env_filter(&self.logging.level) {
            return Err(ConfigError::invalid_value("logging.level", e.to_string()));
        }

        if self.auth.token_header.trim().is_empty() {
            return Err(ConfigError::invalid_value("auth.token_header", "must not be empty"));
        }
        if let Err(e) = http::HeaderName::from_bytes(self.auth.token_header.as_bytes()) {
            return Err(ConfigError::invalid_value(
                "auth.token_header",
                format!("invalid header name '{}': {e}", self.auth.token_header),
            ));
        }

        for exemption in &self.auth.exemptions {
            let method = exemption.method.to_ascii_uppercase();
            if !EXEMPTION_METHODS.contains(&method.as_str()) {
                return Err(ConfigError::invalid_value(
                    "auth.exemptions",
                    format!("unknown method '{}' for {}", exemption.method, exemption.path),
                ));
            }
            if !exemption.path.starts_with('/') {
                return Err(ConfigError::invalid_value(
                    "auth.exemptions",
                    format!("path must start with '/': {}", exemption.path),
                ));
            }
        }

        let base_url = self.user_api.base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::invalid_value(
                "user_api.base_url",
                format!("expected an http(s) URL, got '{base_url}'"),
            ));
        }

        if self.account_rpc.address.trim().is_empty() {
            return Err(ConfigError::invalid_value("account_rpc.address", "must not be empty"));
        }

        if self.account_rpc.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "account_rpc.connect_timeout_ms",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}
