//! Helpers shared by the hub integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use hubbub_hub::{Client, ClientConfig, Hub, HubConfig, Outbound, RoomConfig};
use hubbub_protocol::Event;

/// Polls `condition` until it holds or two seconds pass.
pub async fn settle(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn hub_with_rooms(rooms: &[&str]) -> Hub {
    let hub = Hub::new(&HubConfig::default());
    hub.create_rooms(rooms.iter().copied(), &RoomConfig::default());
    hub
}

pub fn client_config(outbound_queue: usize) -> ClientConfig {
    ClientConfig {
        outbound_queue,
        ..ClientConfig::default()
    }
}

/// Creates a client and waits until the hub has registered it.
pub async fn registered_client(hub: &Hub, outbound_queue: usize) -> (Arc<Client>, Outbound) {
    let (client, outbound) = Client::new(&client_config(outbound_queue));
    hub.register(Arc::clone(&client)).await.unwrap();
    let id = client.id();
    assert!(settle(|| hub.client(id).is_some()).await, "client never registered");
    (client, outbound)
}

/// Subscribes `client` to `room` and waits for the admission to land.
pub async fn join(hub: &Hub, room: &str, client: &Arc<Client>) {
    hub.subscribe(room, Arc::clone(client)).await.unwrap();
    let joined = settle(|| {
        client.in_room(room) && hub.room(room).is_some_and(|r| r.contains(client.id()))
    })
    .await;
    assert!(joined, "{} never joined {room}", client.id());
}

/// Drains everything currently queued for a client.
pub fn drain(outbound: &mut Outbound) -> Vec<Arc<Event>> {
    let mut events = Vec::new();
    while let Ok(event) = outbound.try_recv() {
        events.push(event);
    }
    events
}
