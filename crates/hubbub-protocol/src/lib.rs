//! Wire protocol for hubbub.
//!
//! Every frame exchanged with a client carries one [`Event`]: a typed label
//! plus an optional, schema-less payload, encoded as a JSON array of one
//! or two elements.
//!
//! ```text
//! ["subscribe:chat"]
//! ["chat:message", {"from": "ada", "message": "hi"}]
//! ```
//!
//! The protocol layer knows nothing about connections, clients or rooms.
//! It only converts between bytes and events, and derives the room an
//! event type belongs to.
//!
//! ```text
//! Transport (frames) → Protocol (Event) → Hub (clients, rooms, handlers)
//! ```

mod error;
mod event;

pub use error::ProtocolError;
pub use event::{Event, room_of};
