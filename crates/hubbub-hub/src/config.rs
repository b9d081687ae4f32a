//! Capacity and timing configuration for hubs, rooms and clients.
//!
//! All three structs deserialize with every field optional, so a partial
//! JSON document only overrides what it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Sizing for the hub's registries and operation queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Initial capacity of the client registry.
    pub client_capacity: usize,
    /// Initial capacity of the room registry.
    pub room_capacity: usize,
    /// Initial capacity of the event-type → handler registry.
    pub handler_capacity: usize,
    /// Bound of the register queue.
    pub register_queue: usize,
    /// Bound of the unregister queue.
    pub unregister_queue: usize,
    /// Bound of the broadcast-to-all queue.
    pub broadcast_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            client_capacity: 1024,
            room_capacity: 16,
            handler_capacity: 32,
            register_queue: 256,
            unregister_queue: 256,
            broadcast_queue: 256,
        }
    }
}

impl HubConfig {
    /// Raises every queue bound to at least 1.
    pub fn validated(mut self) -> Self {
        clamp_queue("hub.register_queue", &mut self.register_queue);
        clamp_queue("hub.unregister_queue", &mut self.unregister_queue);
        clamp_queue("hub.broadcast_queue", &mut self.broadcast_queue);
        self
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Sizing for one room: member set, queues and fan-out worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Initial capacity of the member set.
    pub member_capacity: usize,
    /// Bound of the register queue.
    pub register_queue: usize,
    /// Bound of the unregister queue.
    pub unregister_queue: usize,
    /// Bound of the publish queue. Publishers wait while it is full.
    pub publish_queue: usize,
    /// Number of fan-out workers sharing the publish queue.
    pub workers: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            member_capacity: 256,
            register_queue: 64,
            unregister_queue: 64,
            publish_queue: 256,
            workers: 4,
        }
    }
}

impl RoomConfig {
    /// Raises every queue bound and the worker count to at least 1.
    pub fn validated(mut self) -> Self {
        clamp_queue("room.register_queue", &mut self.register_queue);
        clamp_queue("room.unregister_queue", &mut self.unregister_queue);
        clamp_queue("room.publish_queue", &mut self.publish_queue);
        clamp_queue("room.workers", &mut self.workers);
        self
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound of the outbound event queue. Deliveries to a full queue are
    /// dropped.
    pub outbound_queue: usize,
    /// Initial capacity of the client's room-membership set.
    pub room_capacity: usize,
    /// How long the reader waits for a keepalive acknowledgment before
    /// declaring the connection dead, in milliseconds.
    pub pong_wait_ms: u64,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
            room_capacity: 8,
            pong_wait_ms: 60_000,
            max_message_size: 512,
        }
    }
}

impl ClientConfig {
    /// Read deadline window.
    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    /// Interval between keepalive pings: 9/10 of the read deadline, so a
    /// ping always goes out before the deadline expires.
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }

    /// Raises the outbound bound and the deadline to usable minimums.
    pub fn validated(mut self) -> Self {
        clamp_queue("client.outbound_queue", &mut self.outbound_queue);
        if self.pong_wait_ms < 10 {
            tracing::warn!(
                pong_wait_ms = self.pong_wait_ms,
                "client.pong_wait_ms below 10 ms, clamping"
            );
            self.pong_wait_ms = 10;
        }
        self
    }
}

fn clamp_queue(name: &str, value: &mut usize) {
    if *value == 0 {
        tracing::warn!(setting = name, "capacity of 0 is not allowed, using 1");
        *value = 1;
    }
}
