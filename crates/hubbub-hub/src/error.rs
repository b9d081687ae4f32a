//! Error types for the hub layer.

use hubbub_protocol::ProtocolError;

/// Errors returned by hub and room operations.
///
/// Lookup misses (unknown room, unknown event type, already-removed client)
/// are not errors; they complete as no-ops.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub's coordinating task is no longer running.
    #[error("hub is not running")]
    HubStopped,

    /// A room's coordinating task or worker pool is no longer running.
    #[error("room {0} is not running")]
    RoomStopped(String),

    /// An outgoing event could not be built.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Why a non-blocking delivery into a client's outbound queue failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The queue is at capacity; the event was dropped.
    #[error("outbound queue full")]
    Full,

    /// The client has been unregistered and its queue closed.
    #[error("client closed")]
    Closed,
}
