//! Server and startup errors.

use portcullis_config::ConfigError;
use portcullis_core::GatewayError;
use portcullis_rpc::RegistryError;
use portcullis_telemetry::TelemetryError;
use thiserror::Error;

/// Errors that stop the gateway from starting or serving.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured address is not a socket address.
    #[error("invalid listen address '{addr}': {reason}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Failed to bind the listener.
    #[error("failed to bind to {addr}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// A downstream connection could not be established.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A gateway component could not be built.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// I/O failure while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a bind error.
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_keeps_source() {
        let err = ServerError::bind(
            "0.0.0.0:80",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "failed to bind to 0.0.0.0:80");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: ServerError = ConfigError::invalid_value("server.http_addr", "bad").into();
        assert!(err.to_string().contains("server.http_addr"));
    }
}
