//! Registry error types.

use http::StatusCode;
use portcullis_core::GatewayError;
use thiserror::Error;

/// Boxed error returned by dialers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the [`ConnectionRegistry`](crate::ConnectionRegistry).
///
/// The registry never retries; both variants are handed straight to the caller.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The destination address was empty.
    #[error("RPC address must not be empty")]
    EmptyAddress,

    /// Dial options could not be prepared (certificate or config loading).
    #[error("failed to prepare dial options for {address}: {source}")]
    DialOptions {
        /// Destination address.
        address: String,
        /// The underlying failure.
        #[source]
        source: BoxError,
    },

    /// The dialer failed to establish the connection.
    #[error("error creating RPC connection to {address}: {source}")]
    Connection {
        /// Destination address.
        address: String,
        /// The underlying failure.
        #[source]
        source: BoxError,
    },
}

impl RegistryError {
    pub(crate) fn dial_options(address: &str, source: impl Into<BoxError>) -> Self {
        Self::DialOptions {
            address: address.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn connection(address: &str, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            address: address.to_string(),
            source: source.into(),
        }
    }
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        let (message, status) = match err {
            RegistryError::Connection { .. } => {
                ("upstream service unavailable", StatusCode::BAD_GATEWAY)
            }
            RegistryError::EmptyAddress | RegistryError::DialOptions { .. } => {
                ("something went wrong", StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
        GatewayError::internal_with_status(message, status, err)
    }
}
