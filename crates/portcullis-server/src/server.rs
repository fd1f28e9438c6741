//! HTTP server.
//!
//! A Tokio accept loop hands every connection to hyper's HTTP/1 stack. Each
//! request body is collected under the read timeout and a 1 MiB cap, then
//! the request goes through [`Gateway::dispatch`]. A body that cannot be
//! collected is replaced by an empty one and a [`BodyRejection`] extension,
//! so the request still runs through logging.
//!
//! On shutdown the loop stops accepting, open connections finish their
//! in-flight request, and the server waits for them up to the configured
//! shutdown timeout.
//!
//! # Example
//!
//! ```rust,ignore
//! let server = Server::new(&config.server, gateway);
//! server.run(ShutdownSignal::with_os_signals()).await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use portcullis_config::ServerConfig;
use portcullis_middleware::Response;
use tokio::net::{TcpListener, TcpStream};

use crate::body::{BodyRejection, MAX_BODY_BYTES};
use crate::error::ServerError;
use crate::gateway::Gateway;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The gateway's HTTP server.
#[derive(Debug)]
pub struct Server {
    gateway: Gateway,
    http_addr: String,
    read_timeout: Duration,
    shutdown_timeout: Duration,
}

impl Server {
    /// Creates a server for `gateway` using the `[server]` settings.
    #[must_use]
    pub fn new(config: &ServerConfig, gateway: Gateway) -> Self {
        Self {
            gateway,
            http_addr: config.http_addr.clone(),
            read_timeout: config.read_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr: SocketAddr =
            self.http_addr
                .parse()
                .map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
                    addr: self.http_addr.clone(),
                    reason: e.to_string(),
                })?;

        TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr.to_string(), e))
    }

    /// Binds and serves until `shutdown` fires.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "gateway listening");

        let shutdown_timeout = self.shutdown_timeout;
        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                tracing::debug!(remote_addr = %remote_addr, error = %e, "connection closed with error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to accept connection");
                    }
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        tracing::info!(
            active = tracker.active_connections(),
            timeout_secs = shutdown_timeout.as_secs(),
            "waiting for open connections"
        );

        tokio::select! {
            () = tracker.wait_for_shutdown() => {
                tracing::info!("all connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "shutdown timeout reached with connections still open"
                );
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let server = Arc::clone(self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(request, remote_addr).await }
        });

        let conn = http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read_timeout)
            .serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                tracing::debug!(remote_addr = %remote_addr, "draining connection for shutdown");
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(
        &self,
        request: http::Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<Response, Infallible> {
        let (mut parts, body) = request.into_parts();

        let collected =
            tokio::time::timeout(self.read_timeout, Limited::new(body, MAX_BODY_BYTES).collect())
                .await;

        let body = match collected {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => {
                let rejection = if e.is::<LengthLimitError>() {
                    BodyRejection::TooLarge
                } else {
                    BodyRejection::Unreadable
                };
                tracing::debug!(
                    remote_addr = %remote_addr,
                    path = %parts.uri.path(),
                    error = %e,
                    ?rejection,
                    "request body rejected"
                );
                parts.extensions.insert(rejection);
                Bytes::new()
            }
            Err(_) => {
                tracing::warn!(remote_addr = %remote_addr, path = %parts.uri.path(), "request body read timed out");
                parts.extensions.insert(BodyRejection::TimedOut);
                Bytes::new()
            }
        };

        let request = http::Request::from_parts(parts, Full::new(body));
        Ok(self.gateway.dispatch(request, Some(remote_addr)).await)
    }
}

