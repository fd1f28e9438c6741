//! In-memory dialer.
//!
//! [`MemoryDialer`] builds channels over `tokio::io::duplex` pipes instead of
//! sockets, so the registry and service clients can run without a network.
//! The server half of each pipe is delivered to a [`MemoryListener`] when one
//! is attached; without a listener every call fails with `Unavailable`.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use hyper_util::rt::TokioIo;
use portcullis_core::BoxFuture;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tonic::transport::{Channel, Endpoint, Uri};

use crate::connection::ConnectivityState;
use crate::dialer::Dialer;
use crate::error::BoxError;
use crate::options::DialOptions;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Dialer that connects over in-memory pipes.
///
/// # Example
///
/// ```
/// use portcullis_rpc::{ConnectionRegistry, DialConfig, MemoryDialer};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let dialer = Arc::new(MemoryDialer::new());
/// let registry = ConnectionRegistry::new(dialer.clone());
///
/// let first = registry.get_or_create("svc:443", &DialConfig::new()).await.unwrap();
/// let second = registry.get_or_create("svc:443", &DialConfig::new()).await.unwrap();
///
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(dialer.dial_count(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryDialer {
    delay: Option<Duration>,
    failing: AtomicBool,
    dials: AtomicUsize,
    incoming: Option<mpsc::UnboundedSender<DuplexStream>>,
}

impl MemoryDialer {
    /// Creates a dialer with no listener attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dialer whose pipes are delivered to the returned listener.
    #[must_use]
    pub fn with_listener() -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dialer = Self {
            incoming: Some(tx),
            ..Self::default()
        };
        (dialer, MemoryListener { incoming: rx })
    }

    /// Makes every dial take `delay` before completing.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes subsequent dials fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of dials attempted so far.
    #[must_use]
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

impl Dialer for MemoryDialer {
    fn dial<'a>(
        &'a self,
        address: &'a str,
        _options: &'a DialOptions,
    ) -> BoxFuture<'a, Result<Channel, BoxError>> {
        Box::pin(async move {
            self.dials.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("in-memory dial to {address} refused"),
                )
                .into());
            }

            let endpoint = Endpoint::from_shared(format!("http://{address}"))?;
            let incoming = self.incoming.clone();
            let channel = endpoint.connect_with_connector_lazy(tower::service_fn(
                move |_: Uri| {
                    let incoming = incoming.clone();
                    async move {
                        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
                        let delivered = incoming.is_some_and(|tx| tx.send(server).is_ok());
                        if !delivered {
                            return Err(io::Error::new(
                                io::ErrorKind::ConnectionRefused,
                                "no in-memory listener",
                            ));
                        }
                        Ok(TokioIo::new(client))
                    }
                },
            ));
            Ok(channel)
        })
    }

    fn initial_state(&self) -> ConnectivityState {
        ConnectivityState::Idle
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Receives the server half of every pipe a [`MemoryDialer`] opens.
#[derive(Debug)]
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<DuplexStream>,
}

impl MemoryListener {
    /// Waits for the next inbound pipe. Returns `None` once the dialer is dropped.
    pub async fn accept(&mut self) -> Option<DuplexStream> {
        self.incoming.recv().await
    }
}
