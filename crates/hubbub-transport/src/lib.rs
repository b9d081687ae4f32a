//! Transport abstraction layer for hubbub.
//!
//! Provides the [`Transport`], [`Connection`], [`FrameReader`] and
//! [`FrameWriter`] traits that abstract over message-oriented, full-duplex
//! connections. A connection is split into an independently owned reader
//! and writer half so that one task can block on the next inbound frame
//! while another writes outbound frames and keepalive pings.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod frame;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use frame::{CloseFrame, Frame};
#[cfg(feature = "websocket")]
pub use websocket::{
    Incoming, TransportConfig, WebSocketConnection, WebSocketReader,
    WebSocketTransport, WebSocketWriter,
};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection number, shared by every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection, including any
    /// protocol handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A single full-duplex connection that has completed its handshake.
pub trait Connection: Send + 'static {
    /// The inbound half.
    type Reader: FrameReader;
    /// The outbound half.
    type Writer: FrameWriter;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Splits the connection into its reader and writer halves.
    ///
    /// The underlying transport is released once both halves are dropped.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// The inbound half of a [`Connection`].
pub trait FrameReader: Send + 'static {
    /// The error type for receive operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Frame>, Self::Error>> + Send;
}

/// The outbound half of a [`Connection`].
pub trait FrameWriter: Send + 'static {
    /// The error type for send operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the remote peer.
    fn send(
        &mut self,
        frame: Frame,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_increase() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert!(b > a);
        assert_ne!(a.get(), b.get());
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(7).to_string(), "conn-7");
    }
}
