//! Room actor: a named subscriber set with its own fan-out worker pool.
//!
//! Each room runs one coordinating task that applies register/unregister
//! requests, plus `workers` fan-out tasks that compete for events on a
//! single bounded publish queue. Each published event is taken by exactly
//! one worker, which offers it to every current member without waiting:
//! a member whose outbound queue is full misses that event.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use hubbub_protocol::Event;
use tokio::sync::{Mutex, mpsc};

use crate::{Client, ClientId, DeliveryError, HubError, RoomConfig};

/// Member set shared by the coordinating task, the workers and the hub.
///
/// Members are held weakly; the hub's client registry is the only owner.
#[derive(Debug)]
pub(crate) struct Members {
    room: String,
    clients: DashMap<ClientId, Weak<Client>>,
}

impl Members {
    /// Adds `client` to the room and the room to the client, atomically with
    /// respect to hub-side teardown. A closed client is never admitted.
    fn admit(&self, client: &Arc<Client>) {
        let id = client.id();
        client.with_membership(|m| {
            if m.closed {
                tracing::debug!(room = %self.room, client_id = %id, "closed client not admitted");
                return;
            }
            m.rooms.insert(self.room.clone());
            if self.clients.insert(id, Arc::downgrade(client)).is_none() {
                tracing::debug!(room = %self.room, client_id = %id, "client entered the room");
            }
        });
    }

    /// Removes `client` from the room and the room from the client.
    fn release(&self, client: &Client) {
        let id = client.id();
        client.with_membership(|m| {
            if self.clients.remove(&id).is_some() {
                m.rooms.remove(&self.room);
                tracing::debug!(room = %self.room, client_id = %id, "client left the room");
            }
        });
    }

    /// Offers `event` to every current member without blocking.
    fn fan_out(&self, worker: usize, event: &Arc<Event>) {
        for entry in self.clients.iter() {
            let Some(client) = entry.value().upgrade() else {
                continue;
            };
            match client.try_send(Arc::clone(event)) {
                Ok(()) => {}
                Err(DeliveryError::Full) => {
                    tracing::warn!(
                        room = %self.room,
                        worker,
                        client_id = %entry.key(),
                        "event lost for client"
                    );
                }
                Err(DeliveryError::Closed) => {
                    tracing::trace!(
                        room = %self.room,
                        client_id = %entry.key(),
                        "skipping closed client"
                    );
                }
            }
        }
    }
}

/// Handle to a running room.
///
/// Rooms are created once at startup by the hub and live as long as it.
#[derive(Debug)]
pub struct Room {
    members: Arc<Members>,
    register_tx: mpsc::Sender<Arc<Client>>,
    unregister_tx: mpsc::Sender<Arc<Client>>,
    publish_tx: mpsc::Sender<Arc<Event>>,
}

impl Room {
    /// Spawns the room's coordinating task and worker pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(name: impl Into<String>, config: &RoomConfig) -> Arc<Self> {
        let config = config.clone().validated();
        let members = Arc::new(Members {
            room: name.into(),
            clients: DashMap::with_capacity(config.member_capacity),
        });

        let (register_tx, register_rx) = mpsc::channel(config.register_queue);
        let (unregister_tx, unregister_rx) =
            mpsc::channel(config.unregister_queue);
        let (publish_tx, publish_rx) = mpsc::channel(config.publish_queue);

        let queue = Arc::new(Mutex::new(publish_rx));
        for worker in 0..config.workers {
            tokio::spawn(run_worker(
                worker,
                Arc::clone(&members),
                Arc::clone(&queue),
            ));
        }
        tokio::spawn(run_room(Arc::clone(&members), register_rx, unregister_rx));

        tracing::info!(room = %members.room, workers = config.workers, "room created");

        Arc::new(Self {
            members,
            register_tx,
            unregister_tx,
            publish_tx,
        })
    }

    /// Returns the room's name.
    pub fn name(&self) -> &str {
        &self.members.room
    }

    /// Queues `client` for admission.
    pub async fn register(&self, client: Arc<Client>) -> Result<(), HubError> {
        self.register_tx
            .send(client)
            .await
            .map_err(|_| self.stopped())
    }

    /// Queues `client` for removal.
    pub async fn unregister(&self, client: Arc<Client>) -> Result<(), HubError> {
        self.unregister_tx
            .send(client)
            .await
            .map_err(|_| self.stopped())
    }

    /// Queues `event` for fan-out, waiting while the publish queue is full.
    pub async fn publish(&self, event: Arc<Event>) -> Result<(), HubError> {
        self.publish_tx
            .send(event)
            .await
            .map_err(|_| self.stopped())
    }

    /// Number of current members.
    pub fn member_count(&self) -> usize {
        self.members.clients.len()
    }

    /// Returns `true` if the client is a current member.
    pub fn contains(&self, id: ClientId) -> bool {
        self.members.clients.contains_key(&id)
    }

    /// IDs of the current members, sorted.
    pub fn members(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> =
            self.members.clients.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Drops `id` from the member set directly. Used by hub-side teardown
    /// while it holds the client's membership lock.
    pub(crate) fn remove_member(&self, id: ClientId) -> bool {
        self.members.clients.remove(&id).is_some()
    }

    fn stopped(&self) -> HubError {
        HubError::RoomStopped(self.members.room.clone())
    }
}

/// Coordinating loop: applies membership changes one at a time.
async fn run_room(
    members: Arc<Members>,
    mut register_rx: mpsc::Receiver<Arc<Client>>,
    mut unregister_rx: mpsc::Receiver<Arc<Client>>,
) {
    loop {
        tokio::select! {
            Some(client) = register_rx.recv() => members.admit(&client),
            Some(client) = unregister_rx.recv() => members.release(&client),
            else => break,
        }
    }
    tracing::debug!(room = %members.room, "room loop stopped");
}

/// Fan-out worker: takes one event at a time off the shared queue.
async fn run_worker(
    worker: usize,
    members: Arc<Members>,
    queue: Arc<Mutex<mpsc::Receiver<Arc<Event>>>>,
) {
    loop {
        // The lock is released before fan-out so peers can take the next event.
        let next = queue.lock().await.recv().await;
        let Some(event) = next else {
            break;
        };
        members.fan_out(worker, &event);
    }
    tracing::debug!(room = %members.room, worker, "fan-out worker stopped");
}
