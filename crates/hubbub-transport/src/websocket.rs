//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{
    CloseFrame, Connection, ConnectionId, Frame, FrameReader, FrameWriter,
    Transport, TransportError,
};

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Limits applied to every accepted WebSocket.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    /// Maximum size of a complete (reassembled) message, in bytes.
    pub max_message_size: usize,
    /// Maximum size of a single frame, in bytes.
    pub max_frame_size: usize,
    /// How long a freshly accepted socket may take to complete the upgrade.
    pub handshake_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 << 10,
            max_frame_size: 16 << 10,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    fn to_ws_config(self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_message_size);
        config.max_frame_size = Some(self.max_frame_size);
        config
    }
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: TransportConfig,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(
        addr: &str,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::Bind {
                addr: addr.to_owned(),
                source,
            }
        })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener, config })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the next TCP connection without running the WebSocket
    /// handshake.
    ///
    /// Servers call this in their accept loop and finish each
    /// [`Incoming::upgrade`] on its own task, so a peer that never sends
    /// the upgrade request cannot hold up the listener.
    pub async fn accept_incoming(&mut self) -> Result<Incoming, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        Ok(Incoming {
            stream,
            addr,
            config: self.config,
        })
    }
}

/// A TCP connection whose WebSocket handshake has not run yet.
#[derive(Debug)]
pub struct Incoming {
    stream: TcpStream,
    addr: SocketAddr,
    config: TransportConfig,
}

impl Incoming {
    /// The peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the WebSocket handshake, bounded by
    /// [`TransportConfig::handshake_timeout`].
    ///
    /// # Errors
    /// [`TransportError::Handshake`] if the upgrade fails or times out.
    pub async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let addr = self.addr;
        let handshake = tokio_tungstenite::accept_async_with_config(
            self.stream,
            Some(self.config.to_ws_config()),
        );

        let ws = match tokio::time::timeout(self.config.handshake_timeout, handshake).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                tracing::debug!(%addr, error = %e, "WebSocket handshake failed");
                return Err(TransportError::Handshake(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e,
                )));
            }
            Err(_) => {
                tracing::debug!(%addr, "WebSocket handshake timed out");
                return Err(TransportError::Handshake(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "handshake timed out",
                )));
            }
        };

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection { id, ws })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Accepts and upgrades one connection in place. The handshake runs
    /// on the caller's task; see [`WebSocketTransport::accept_incoming`].
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.accept_incoming().await?.upgrade().await
    }
}

/// A single WebSocket connection, not yet split.
pub struct WebSocketConnection {
    id: ConnectionId,
    ws: WsStream,
}

impl Connection for WebSocketConnection {
    type Reader = WebSocketReader;
    type Writer = WebSocketWriter;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = self.ws.split();
        (
            WebSocketReader {
                id: self.id,
                stream,
            },
            WebSocketWriter {
                id: self.id,
                sink,
            },
        )
    }
}

/// Inbound half of a [`WebSocketConnection`].
pub struct WebSocketReader {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl FrameReader for WebSocketReader {
    type Error = TransportError;

    async fn recv(&mut self) -> Result<Option<Frame>, Self::Error> {
        loop {
            let frame = match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    Frame::Text(text.as_str().to_owned())
                }
                Some(Ok(Message::Binary(data))) => Frame::Binary(data.into()),
                Some(Ok(Message::Ping(data))) => Frame::Ping(data.into()),
                Some(Ok(Message::Pong(data))) => Frame::Pong(data.into()),
                Some(Ok(Message::Close(close))) => {
                    Frame::Close(close.map(|c| {
                        CloseFrame::new(u16::from(c.code), c.reason.as_str())
                    }))
                }
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(
                    tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed,
                ))
                | None => return Ok(None),
                Some(Err(tungstenite::Error::Capacity(
                    tungstenite::error::CapacityError::MessageTooLong { size, max_size },
                ))) => {
                    return Err(TransportError::MessageTooLarge {
                        size,
                        limit: max_size,
                    });
                }
                Some(Err(e)) => {
                    tracing::trace!(id = %self.id, error = %e, "websocket read error");
                    return Err(TransportError::Receive(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            };
            return Ok(Some(frame));
        }
    }
}

/// Outbound half of a [`WebSocketConnection`].
pub struct WebSocketWriter {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl FrameWriter for WebSocketWriter {
    type Error = TransportError;

    async fn send(&mut self, frame: Frame) -> Result<(), Self::Error> {
        let msg = match frame {
            Frame::Text(text) => Message::text(text),
            Frame::Binary(data) => Message::Binary(data.into()),
            Frame::Ping(data) => Message::Ping(data.into()),
            Frame::Pong(data) => Message::Pong(data.into()),
            Frame::Close(close) => {
                Message::Close(close.map(|c| {
                    tungstenite::protocol::CloseFrame {
                        code: CloseCode::from(c.code),
                        reason: c.reason.into(),
                    }
                }))
            }
        };
        self.sink.send(msg).await.map_err(|e| {
            tracing::trace!(id = %self.id, error = %e, "websocket write error");
            TransportError::Send(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}
