//! Transport-neutral frame type.

/// Status code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close status code (RFC 6455 numbering, e.g. 1000 = normal).
    pub code: u16,
    /// Human-readable reason.
    pub reason: String,
}

impl CloseFrame {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// The endpoint is going away.
    pub const GOING_AWAY: u16 = 1001;
    /// A message exceeded the configured size limit.
    pub const TOO_BIG: u16 = 1009;

    /// Creates a close frame with the given code and reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A single message travelling over a [`Connection`](crate::Connection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text data.
    Text(String),
    /// Raw binary data.
    Binary(Vec<u8>),
    /// Keepalive ping.
    Ping(Vec<u8>),
    /// Keepalive acknowledgment.
    Pong(Vec<u8>),
    /// Close handshake, optionally with a status code.
    Close(Option<CloseFrame>),
}

impl Frame {
    /// Creates a text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Returns the application data of a text or binary frame.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Binary(data) => Some(data),
            _ => None,
        }
    }
}
