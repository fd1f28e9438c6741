//! Dialer strategies.
//!
//! The [`ConnectionRegistry`](crate::ConnectionRegistry) never picks a
//! transport itself; it is handed a [`Dialer`] at construction.
//! [`TonicDialer`] performs a real network dial and
//! [`MemoryDialer`](crate::MemoryDialer) substitutes an in-memory transport.

use portcullis_core::BoxFuture;
use tonic::transport::{Channel, Endpoint};

use crate::connection::ConnectivityState;
use crate::error::BoxError;
use crate::options::DialOptions;

/// Establishes transport-level connections.
pub trait Dialer: Send + Sync + 'static {
    /// Connects to `address`.
    fn dial<'a>(
        &'a self,
        address: &'a str,
        options: &'a DialOptions,
    ) -> BoxFuture<'a, Result<Channel, BoxError>>;

    /// State of a freshly dialed connection.
    ///
    /// Eager dialers return [`ConnectivityState::Ready`]; lazy ones
    /// [`ConnectivityState::Idle`].
    fn initial_state(&self) -> ConnectivityState {
        ConnectivityState::Ready
    }

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// Network dialer backed by tonic's HTTP/2 transport.
///
/// The connection is established eagerly so dial failures surface from
/// [`get_or_create`](crate::ConnectionRegistry::get_or_create) rather than
/// from the first call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TonicDialer;

impl TonicDialer {
    /// Creates a new dialer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn endpoint(address: &str, options: &DialOptions) -> Result<Endpoint, BoxError> {
        let uri = if address.contains("://") {
            address.to_string()
        } else if options.is_tls() {
            format!("https://{address}")
        } else {
            format!("http://{address}")
        };

        let mut endpoint = Endpoint::from_shared(uri)?;
        if let Some(timeout) = options.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        if let Some(tls) = &options.tls {
            endpoint = endpoint.tls_config(tls.clone())?;
        }
        Ok(endpoint)
    }
}

impl Dialer for TonicDialer {
    fn dial<'a>(
        &'a self,
        address: &'a str,
        options: &'a DialOptions,
    ) -> BoxFuture<'a, Result<Channel, BoxError>> {
        Box::pin(async move {
            let endpoint = Self::endpoint(address, options)?;
            let channel = endpoint.connect().await?;
            Ok(channel)
        })
    }

    fn name(&self) -> &'static str {
        "tonic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_endpoint_scheme_follows_tls() {
        let plain = TonicDialer::endpoint("svc:443", &DialOptions::default()).expect("valid");
        assert_eq!(plain.uri().scheme_str(), Some("http"));

        let explicit =
            TonicDialer::endpoint("https://svc:443", &DialOptions::default()).expect("valid");
        assert_eq!(explicit.uri().scheme_str(), Some("https"));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        assert!(TonicDialer::endpoint("bad address with spaces", &DialOptions::default()).is_err());
    }

    #[tokio::test]
    async fn test_dial_refused_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let options = DialOptions {
            connect_timeout: Some(Duration::from_millis(500)),
            tls: None,
        };
        let result = TonicDialer::new().dial(&addr.to_string(), &options).await;
        assert!(result.is_err());
    }
}
