//! Dial configuration.
//!
//! [`DialConfig`] is what callers hand to the registry. It is resolved into
//! [`DialOptions`] just before dialing; resolution reads the trust anchor from
//! disk and can fail independently of the network call.

use std::path::PathBuf;
use std::time::Duration;

use tonic::transport::{Certificate, ClientTlsConfig};

use crate::error::BoxError;

/// Caller-supplied dial configuration.
///
/// # Example
///
/// ```
/// use portcullis_rpc::DialConfig;
/// use std::time::Duration;
///
/// let config = DialConfig::new()
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_ca_cert("certs/ca.pem", Some("account.internal".to_string()));
/// assert!(config.ca_cert_path.is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialConfig {
    /// Upper bound on establishing the connection. `None` leaves it unbounded.
    pub connect_timeout: Option<Duration>,
    /// PEM file holding the server's trust anchor. `None` dials in plaintext.
    pub ca_cert_path: Option<PathBuf>,
    /// Server name to verify the certificate against.
    pub tls_domain: Option<String>,
}

impl DialConfig {
    /// Creates a plaintext configuration with no timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Enables one-way TLS with the given trust anchor.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>, domain: Option<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self.tls_domain = domain;
        self
    }
}

/// Dial options ready to hand to a [`Dialer`](crate::Dialer).
#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    /// Upper bound on establishing the connection.
    pub connect_timeout: Option<Duration>,
    /// TLS settings, when the connection is secured.
    pub tls: Option<ClientTlsConfig>,
}

impl DialOptions {
    /// Resolves a [`DialConfig`], loading and checking certificate material.
    pub async fn resolve(config: &DialConfig) -> Result<Self, BoxError> {
        let tls = match &config.ca_cert_path {
            Some(path) => {
                let pem = tokio::fs::read(path).await.map_err(|e| {
                    format!("could not read certificate {}: {e}", path.display())
                })?;
                if !looks_like_pem_certificate(&pem) {
                    return Err(format!(
                        "could not append certificate to pool: {} holds no PEM certificate",
                        path.display()
                    )
                    .into());
                }

                let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem));
                if let Some(domain) = &config.tls_domain {
                    tls = tls.domain_name(domain.clone());
                }
                Some(tls)
            }
            None => None,
        };

        Ok(Self {
            connect_timeout: config.connect_timeout,
            tls,
        })
    }

    /// Returns `true` if the connection is secured with TLS.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.tls.is_some()
    }
}

fn looks_like_pem_certificate(pem: &[u8]) -> bool {
    const MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";
    pem.windows(MARKER.len()).any(|window| window == MARKER)
}
