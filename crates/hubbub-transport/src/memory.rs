//! In-process connection pair backed by tokio channels.
//!
//! [`pair`] returns the server-side [`MemoryConnection`] together with a
//! [`MemoryPeer`] that plays the remote end. Useful for driving connection
//! pumps without opening sockets.

use tokio::sync::mpsc;

use crate::{
    Connection, ConnectionId, Frame, FrameReader, FrameWriter, TransportError,
};

/// Creates a connected in-memory pair.
pub fn pair() -> (MemoryConnection, MemoryPeer) {
    let (to_server, from_peer) = mpsc::unbounded_channel();
    let (to_peer, from_server) = mpsc::unbounded_channel();
    (
        MemoryConnection {
            id: ConnectionId::next(),
            inbound: from_peer,
            outbound: to_peer,
        },
        MemoryPeer {
            outbound: Some(to_server),
            inbound: from_server,
        },
    )
}

/// The server side of an in-memory pair.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::UnboundedSender<Frame>,
}

impl Connection for MemoryConnection {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            MemoryReader {
                inbound: self.inbound,
            },
            MemoryWriter {
                outbound: self.outbound,
            },
        )
    }
}

/// Inbound half of a [`MemoryConnection`].
pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Frame>,
}

impl FrameReader for MemoryReader {
    type Error = TransportError;

    async fn recv(&mut self) -> Result<Option<Frame>, Self::Error> {
        Ok(self.inbound.recv().await)
    }
}

/// Outbound half of a [`MemoryConnection`].
pub struct MemoryWriter {
    outbound: mpsc::UnboundedSender<Frame>,
}

impl FrameWriter for MemoryWriter {
    type Error = TransportError;

    async fn send(&mut self, frame: Frame) -> Result<(), Self::Error> {
        self.outbound.send(frame).map_err(|_| {
            TransportError::Closed("peer dropped".into())
        })
    }
}

/// The remote end of an in-memory pair.
pub struct MemoryPeer {
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    inbound: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryPeer {
    /// Sends a frame to the server side.
    pub fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let Some(outbound) = &self.outbound else {
            return Err(TransportError::Closed("peer closed".into()));
        };
        outbound.send(frame).map_err(|_| {
            TransportError::Closed("server dropped".into())
        })
    }

    /// Receives the next frame written by the server side.
    ///
    /// Returns `None` once the server's writer half is dropped.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound.recv().await
    }

    /// Ends the peer's outbound stream; the server reader sees a clean close.
    pub fn close(&mut self) {
        self.outbound = None;
    }
}
