//! Unified error type for hubbub.

use hubbub_hub::HubError;
use hubbub_protocol::ProtocolError;
use hubbub_transport::TransportError;

use crate::SettingsError;

/// Top-level error wrapping every layer's error.
///
/// The `#[from]` conversions let `?` lift layer errors directly.
#[derive(Debug, thiserror::Error)]
pub enum HubbubError {
    /// Binding, accepting or talking to a connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The hub or one of its rooms is no longer running.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// The settings file could not be read or parsed.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
