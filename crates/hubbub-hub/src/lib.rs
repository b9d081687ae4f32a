//! Concurrency core of hubbub: the hub, its rooms, and the per-connection
//! pumps that bridge a transport to both.
//!
//! # Key types
//!
//! - [`Hub`]: owns every client and room; registers, unregisters,
//!   broadcasts and dispatches inbound events to handlers
//! - [`Room`]: named member set with a bounded publish queue and a pool
//!   of fan-out workers
//! - [`Client`]: one connection's outbound queue and room memberships
//! - [`HubConfig`], [`RoomConfig`], [`ClientConfig`]: capacities and timing
//!
//! # Ownership
//!
//! The hub's registries are the only owners of clients and rooms. A room
//! holds its members weakly and a client records its rooms by name, and
//! both sides of a membership are changed together under the client's
//! membership lock.
//!
//! # Delivery
//!
//! Deliveries into a client's outbound queue never wait: a full queue
//! drops the event for that client and logs a warning. Publishing into a
//! room waits while the room's own publish queue is full.

mod client;
mod config;
mod error;
mod handler;
mod hub;
mod pump;
mod room;

pub use client::{Client, ClientId, Outbound};
pub use config::{ClientConfig, HubConfig, RoomConfig};
pub use error::{DeliveryError, HubError};
pub use handler::EventHandler;
pub use hub::Hub;
pub use room::Room;
