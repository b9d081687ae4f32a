//! Error types for the protocol layer.
//!
//! Each crate in hubbub defines its own error enum. A `ProtocolError`
//! always means a frame or payload could not be converted to or from its
//! wire form; it never means the connection itself is broken.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes or JSON).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed.
    ///
    /// Common causes: malformed JSON, an envelope that is not a one- or
    /// two-element array, a non-string event type, or a payload that does
    /// not match the requested shape.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The value is well-formed but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
