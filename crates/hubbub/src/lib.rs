//! # Hubbub
//!
//! Real-time publish/subscribe over WebSockets.
//!
//! Clients connect, send `[type, payload]` events, and the hub routes each
//! event to the handler registered for its type. Handlers typically
//! subscribe clients to named rooms and publish into them; every member of
//! a room receives what is published there.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hubbub::prelude::*;
//!
//! # async fn run() -> Result<(), HubbubError> {
//! let server = HubServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .rooms(["chat"])
//!     .build()
//!     .await?;
//!
//! server.hub().on("subscribe:chat", |hub: Hub, client, _event| async move {
//!     let _ = hub.subscribe("chat", client).await;
//! });
//! server.hub().on("chat:message", |hub: Hub, _client, event: Event| async move {
//!     let _ = hub.broadcast_to_room("chat", event).await;
//! });
//!
//! server.run().await
//! # }
//! ```

mod error;
mod server;
pub mod settings;
pub mod telemetry;

pub use error::HubbubError;
pub use server::{HubServer, HubServerBuilder};
pub use settings::{Settings, SettingsError};

pub use hubbub_hub as hub;
pub use hubbub_protocol as protocol;
pub use hubbub_transport as transport;

pub mod prelude {
    //! Common imports for applications built on hubbub.

    pub use crate::{HubServer, HubServerBuilder, HubbubError, Settings};
    pub use hubbub_hub::{
        Client, ClientConfig, ClientId, DeliveryError, Hub, HubConfig, HubError,
        Room, RoomConfig,
    };
    pub use hubbub_protocol::{Event, ProtocolError, room_of};
    pub use hubbub_transport::{TransportConfig, TransportError};
}
