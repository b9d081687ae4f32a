use std::io;

/// Errors raised by transports and connection halves.
///
/// A clean close by the peer is not an error; readers report it as
/// `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The WebSocket upgrade did not complete.
    #[error("handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// The peer sent a message larger than the configured limit.
    #[error("message too large: {size} bytes (limit {limit})")]
    MessageTooLarge { size: usize, limit: usize },

    /// Reading the next frame failed.
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// The other side of the connection is gone.
    #[error("connection closed: {0}")]
    Closed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_names_address() {
        let err = TransportError::Bind {
            addr: "0.0.0.0:80".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "cannot bind 0.0.0.0:80: denied");
    }

    #[test]
    fn test_message_too_large_reports_sizes() {
        let err = TransportError::MessageTooLarge { size: 2048, limit: 1024 };
        assert_eq!(err.to_string(), "message too large: 2048 bytes (limit 1024)");
    }
}
