//! A single outbound RPC connection.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tonic::transport::Channel;
use tonic::{Code, Status};

/// Connectivity state of an [`RpcConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectivityState {
    /// Created but no call has gone through yet.
    Idle = 0,
    /// A call is establishing the transport.
    Connecting = 1,
    /// The transport is established and serving calls.
    Ready = 2,
    /// Closed, or failed in a way that requires a new connection.
    Shutdown = 3,
}

impl ConnectivityState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Ready,
            _ => Self::Shutdown,
        }
    }

    /// Returns the state name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound RPC connection shared by the registry and every service
/// client built from it.
///
/// The state lives on the connection itself and is read on demand. Once a
/// connection reaches [`ConnectivityState::Shutdown`] it never leaves it; the
/// registry replaces it on the next lookup.
pub struct RpcConnection {
    address: String,
    channel: Channel,
    state: AtomicU8,
}

impl RpcConnection {
    /// Wraps a dialed channel.
    #[must_use]
    pub fn new(address: impl Into<String>, channel: Channel, state: ConnectivityState) -> Self {
        Self {
            address: address.into(),
            channel,
            state: AtomicU8::new(state as u8),
        }
    }

    /// Returns the destination address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectivityState {
        ConnectivityState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` once the connection is shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.state() == ConnectivityState::Shutdown
    }

    /// Returns a handle for issuing calls.
    ///
    /// Fails with `Unavailable` after the connection has been shut down.
    pub fn channel(&self) -> Result<Channel, Status> {
        if self.is_shutdown() {
            return Err(Status::unavailable(format!(
                "connection to {} is shut down",
                self.address
            )));
        }
        Ok(self.channel.clone())
    }

    /// Shuts the connection down. Calling it again has no effect.
    ///
    /// The transport itself is released when the last clone of the channel is dropped.
    pub fn close(&self) {
        self.state
            .store(ConnectivityState::Shutdown as u8, Ordering::Release);
    }

    /// Moves an idle connection to `Connecting` before its first call.
    pub fn begin_call(&self) {
        self.transition(ConnectivityState::Idle, ConnectivityState::Connecting);
    }

    /// Updates the state from the outcome of a call.
    ///
    /// Any response from the peer proves the transport is up; a local deadline
    /// proves nothing and leaves the state alone. An `Unavailable`
    /// status marks the connection shut down so it gets redialed.
    pub fn record_outcome<T>(&self, outcome: &Result<T, Status>) {
        match outcome {
            Err(status) if status.code() == Code::Unavailable => {
                tracing::warn!(
                    address = %self.address,
                    error = %status.message(),
                    "RPC connection unavailable, marking for redial"
                );
                self.close();
            }
            Err(status) if matches!(status.code(), Code::DeadlineExceeded | Code::Cancelled) => {}
            _ => {
                self.transition(ConnectivityState::Idle, ConnectivityState::Ready);
                self.transition(ConnectivityState::Connecting, ConnectivityState::Ready);
            }
        }
    }

    fn transition(&self, from: ConnectivityState, to: ConnectivityState) {
        let _ = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire);
    }
}

impl fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConnection")
            .field("address", &self.address)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::transport::Endpoint;

    fn lazy_connection(state: ConnectivityState) -> RpcConnection {
        let channel = Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
        RpcConnection::new("127.0.0.1:1", channel, state)
    }

    #[tokio::test]
    async fn test_state_transitions_on_success() {
        let conn = lazy_connection(ConnectivityState::Idle);
        conn.begin_call();
        assert_eq!(conn.state(), ConnectivityState::Connecting);

        conn.record_outcome(&Ok::<_, Status>(()));
        assert_eq!(conn.state(), ConnectivityState::Ready);
    }

    #[tokio::test]
    async fn test_unavailable_shuts_down() {
        let conn = lazy_connection(ConnectivityState::Ready);
        conn.record_outcome(&Err::<(), _>(Status::unavailable("connection reset")));
        assert!(conn.is_shutdown());

        let err = conn.channel().unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn test_other_errors_keep_connection() {
        let conn = lazy_connection(ConnectivityState::Ready);
        conn.record_outcome(&Err::<(), _>(Status::not_found("no such account")));
        assert_eq!(conn.state(), ConnectivityState::Ready);
        assert!(conn.channel().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_is_terminal() {
        let conn = lazy_connection(ConnectivityState::Idle);
        conn.close();
        conn.close();
        conn.begin_call();
        conn.record_outcome(&Ok::<_, Status>(()));
        assert_eq!(conn.state(), ConnectivityState::Shutdown);
    }
}
