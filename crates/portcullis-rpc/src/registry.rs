//! The connection registry.
//!
//! [`ConnectionRegistry`] hands out shared [`RpcConnection`]s keyed by
//! destination address. Lookups of a live entry only take a shard read lock;
//! creating or replacing an entry locks the one shard holding that address, and
//! only for the final insert. The dial itself runs with no lock held, so
//! concurrent first callers may each dial. The first connection stored wins and
//! the losers close theirs, which leaves exactly one entry per address and
//! every caller holding that same entry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::connection::{ConnectivityState, RpcConnection};
use crate::dialer::Dialer;
use crate::error::RegistryError;
use crate::options::{DialConfig, DialOptions};

/// Metric names.
mod metric {
    pub const DIALS: &str = "portcullis_rpc_dials_total";
    pub const CONNECTIONS: &str = "portcullis_rpc_connections";
}

/// Registry of live outbound RPC connections.
///
/// # Example
///
/// ```
/// use portcullis_rpc::{ConnectionRegistry, DialConfig, MemoryDialer};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let registry = ConnectionRegistry::new(Arc::new(MemoryDialer::new()));
/// let conn = registry.get_or_create("account:9090", &DialConfig::new()).await.unwrap();
/// assert_eq!(conn.address(), "account:9090");
///
/// registry.close("account:9090");
/// assert!(registry.is_empty());
/// # }
/// ```
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<RpcConnection>>,
    dialer: Arc<dyn Dialer>,
}

impl ConnectionRegistry {
    /// Creates an empty registry that dials through `dialer`.
    #[must_use]
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self {
            connections: DashMap::new(),
            dialer,
        }
    }

    /// Returns a usable connection for `address`, dialing one if needed.
    ///
    /// A stored entry is reused unless it is shut down. Otherwise the dial
    /// options are resolved and the dialer invoked, bounded by
    /// `config.connect_timeout`. Failures are returned as-is; nothing is retried.
    pub async fn get_or_create(
        &self,
        address: &str,
        config: &DialConfig,
    ) -> Result<Arc<RpcConnection>, RegistryError> {
        if address.is_empty() {
            return Err(RegistryError::EmptyAddress);
        }

        if let Some(existing) = self.lookup(address) {
            if !existing.is_shutdown() {
                return Ok(existing);
            }
            tracing::info!(address, "connection was already closed");
        }

        tracing::info!(address, dialer = self.dialer.name(), "creating new RPC connection");

        let options = DialOptions::resolve(config)
            .await
            .map_err(|source| RegistryError::dial_options(address, source))?;

        let dialed = self.dial(address, &options).await;
        let outcome = if dialed.is_ok() { "success" } else { "failure" };
        metrics::counter!(metric::DIALS, "address" => address.to_string(), "outcome" => outcome)
            .increment(1);
        let channel = dialed?;

        let fresh = Arc::new(RpcConnection::new(
            address,
            channel,
            self.dialer.initial_state(),
        ));
        let stored = self.store(address, fresh);
        self.record_size();
        Ok(stored)
    }

    /// Removes and closes the connection for `address`. Does nothing if there is none.
    pub fn close(&self, address: &str) {
        if let Some((_, conn)) = self.connections.remove(address) {
            conn.close();
            tracing::info!(address, "closed RPC connection");
            self.record_size();
        }
    }

    /// Removes and closes every connection. Used at process shutdown.
    pub fn close_all(&self) {
        tracing::info!(count = self.connections.len(), "closing all RPC connections");
        self.drain();
    }

    /// Removes and closes every connection without logging.
    ///
    /// A coarse emergency path; prefer [`close_all`](Self::close_all).
    pub fn terminate(&self) {
        self.drain();
    }

    /// Returns the stored connection for `address`, whatever its state.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<Arc<RpcConnection>> {
        self.lookup(address)
    }

    /// Returns `true` if an entry is stored for `address`.
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.connections.contains_key(address)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns `(address, state)` for every stored entry.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, ConnectivityState)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    fn lookup(&self, address: &str) -> Option<Arc<RpcConnection>> {
        self.connections
            .get(address)
            .map(|entry| Arc::clone(entry.value()))
    }

    async fn dial(
        &self,
        address: &str,
        options: &DialOptions,
    ) -> Result<tonic::transport::Channel, RegistryError> {
        let attempt = self.dialer.dial(address, options);
        let result = match options.connect_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, attempt).await {
                Ok(result) => result,
                Err(_) => Err(format!("dial timed out after {timeout:?}").into()),
            },
            None => attempt.await,
        };

        result.map_err(|source| {
            tracing::warn!(address, error = %source, "failed to create RPC connection");
            RegistryError::connection(address, source)
        })
    }

    fn store(&self, address: &str, fresh: Arc<RpcConnection>) -> Arc<RpcConnection> {
        match self.connections.entry(address.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_shutdown() {
                    occupied.insert(Arc::clone(&fresh));
                    fresh
                } else {
                    tracing::debug!(address, "concurrent dial lost the race, reusing stored connection");
                    fresh.close();
                    Arc::clone(occupied.get())
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&fresh));
                fresh
            }
        }
    }

    fn drain(&self) {
        let addresses: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for address in addresses {
            if let Some((_, conn)) = self.connections.remove(&address) {
                conn.close();
            }
        }
        self.record_size();
    }

    fn record_size(&self) {
        metrics::gauge!(metric::CONNECTIONS).set(self.connections.len() as f64);
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("dialer", &self.dialer.name())
            .field("connections", &self.connections.len())
            .finish()
    }
}
