//! The hub: process-wide registry of clients and rooms.
//!
//! [`Hub`] is a cheap-to-clone handle. Registration, unregistration and
//! broadcast-to-all requests are queued to a single coordinating task, the
//! only place clients enter or leave the registry. Room publishes and
//! direct sends bypass that task and go straight to the room's publish
//! queue or the client's outbound queue.
//!
//! ```text
//!  reader pump ──► handler ──► Hub::broadcast_to_room ──► Room publish queue
//!                                                          │ (N workers)
//!  writer pump ◄── Client outbound queue ◄─── try_send ────┘
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use hubbub_protocol::Event;
use hubbub_transport::Connection;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::handler::{EventHandler, boxed};
use crate::pump;
use crate::{
    Client, ClientConfig, ClientId, DeliveryError, HubConfig, HubError, Room,
    RoomConfig,
};

/// Client and room registries, shared with the coordinating task.
struct Registry {
    clients: DashMap<ClientId, Arc<Client>>,
    rooms: DashMap<String, Arc<Room>>,
}

struct HubInner {
    registry: Arc<Registry>,
    handlers: DashMap<String, EventHandler>,
    register_tx: mpsc::Sender<Arc<Client>>,
    unregister_tx: mpsc::Sender<Arc<Client>>,
    broadcast_tx: mpsc::Sender<Arc<Event>>,
}

/// Handle to the hub. Clone freely; all clones address the same hub.
///
/// The coordinating task stops once every handle has been dropped.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("clients", &self.client_count())
            .field("rooms", &self.room_names())
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Creates a hub and spawns its coordinating task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &HubConfig) -> Self {
        let config = config.clone().validated();
        let registry = Arc::new(Registry {
            clients: DashMap::with_capacity(config.client_capacity),
            rooms: DashMap::with_capacity(config.room_capacity),
        });

        let (register_tx, register_rx) = mpsc::channel(config.register_queue);
        let (unregister_tx, unregister_rx) =
            mpsc::channel(config.unregister_queue);
        let (broadcast_tx, broadcast_rx) =
            mpsc::channel(config.broadcast_queue);

        let actor = HubActor {
            registry: Arc::clone(&registry),
            register_rx,
            unregister_rx,
            broadcast_rx,
        };
        tokio::spawn(actor.run());

        Self {
            inner: Arc::new(HubInner {
                registry,
                handlers: DashMap::with_capacity(config.handler_capacity),
                register_tx,
                unregister_tx,
                broadcast_tx,
            }),
        }
    }

    /// Creates one room per name. A name that already has a room keeps it.
    pub fn create_rooms<I, S>(&self, names: I, config: &RoomConfig)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name: String = name.into();
            let room_name = name.clone();
            self.inner
                .registry
                .rooms
                .entry(name)
                .or_insert_with(|| Room::spawn(room_name, config));
        }
    }

    /// Installs the handler for `event_type`, replacing any previous one.
    pub fn on<F, Fut>(&self, event_type: impl Into<String>, handler: F)
    where
        F: Fn(Hub, Arc<Client>, Event) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let event_type = event_type.into();
        tracing::debug!(%event_type, "event handler installed");
        self.inner.handlers.insert(event_type, boxed(handler));
    }

    /// Admits a transport connection: creates its client, queues the
    /// registration and starts the reader and writer pumps.
    ///
    /// # Errors
    /// [`HubError::HubStopped`] if the coordinating task is gone.
    pub async fn on_connect<C: Connection>(
        &self,
        conn: C,
        config: &ClientConfig,
    ) -> Result<Arc<Client>, HubError> {
        let config = config.clone().validated();
        let (client, outbound) = Client::new(&config);
        tracing::debug!(client_id = %client.id(), conn_id = %conn.id(), "client connected");

        self.register(Arc::clone(&client)).await?;
        pump::spawn(self.clone(), Arc::clone(&client), outbound, conn, &config);
        Ok(client)
    }

    /// Queues `client` for registration.
    pub async fn register(&self, client: Arc<Client>) -> Result<(), HubError> {
        self.inner
            .register_tx
            .send(client)
            .await
            .map_err(|_| HubError::HubStopped)
    }

    /// Queues `client` for unregistration. Safe to call more than once.
    pub async fn unregister(&self, client: Arc<Client>) -> Result<(), HubError> {
        self.inner
            .unregister_tx
            .send(client)
            .await
            .map_err(|_| HubError::HubStopped)
    }

    /// Queues `event` for delivery to every registered client.
    pub async fn broadcast_to_all(&self, event: Event) -> Result<(), HubError> {
        self.inner
            .broadcast_tx
            .send(Arc::new(event))
            .await
            .map_err(|_| HubError::HubStopped)
    }

    /// Publishes `event` into the named room, waiting while that room's
    /// publish queue is full. Unknown rooms drop the event silently.
    pub async fn broadcast_to_room(
        &self,
        room: &str,
        event: Event,
    ) -> Result<(), HubError> {
        let Some(room) = self.room(room) else {
            tracing::trace!(room, event_type = %event.event_type, "no such room, event dropped");
            return Ok(());
        };
        room.publish(Arc::new(event)).await
    }

    /// Delivers `event` to one client without waiting. A full queue drops it.
    pub fn send_to_client(&self, client: &Client, event: Event) {
        match client.try_send(Arc::new(event)) {
            Ok(()) => {}
            Err(DeliveryError::Full) => {
                tracing::warn!(client_id = %client.id(), "event lost for client");
            }
            Err(DeliveryError::Closed) => {
                tracing::trace!(client_id = %client.id(), "client closed, event dropped");
            }
        }
    }

    /// Builds an event and publishes it into the room its type names
    /// (`"chat:message"` → `"chat"`).
    ///
    /// # Errors
    /// [`HubError::Protocol`] if `payload` cannot be encoded.
    pub async fn publish<T: Serialize>(
        &self,
        event_type: &str,
        payload: &T,
    ) -> Result<(), HubError> {
        let event = Event::with_payload(event_type, payload)?;
        let room = event.room().to_owned();
        self.broadcast_to_room(&room, event).await
    }

    /// Builds an event and delivers it to one client without waiting.
    ///
    /// # Errors
    /// [`HubError::Protocol`] if `payload` cannot be encoded.
    pub fn send_event_to_client<T: Serialize>(
        &self,
        client: &Client,
        event_type: &str,
        payload: &T,
    ) -> Result<(), HubError> {
        let event = Event::with_payload(event_type, payload)?;
        self.send_to_client(client, event);
        Ok(())
    }

    /// Asks the named room to admit `client`. Unknown rooms are a no-op.
    pub async fn subscribe(
        &self,
        room: &str,
        client: Arc<Client>,
    ) -> Result<(), HubError> {
        match self.room(room) {
            Some(room) => room.register(client).await,
            None => Ok(()),
        }
    }

    /// Asks the named room to release `client`. Unknown rooms are a no-op.
    pub async fn unsubscribe(
        &self,
        room: &str,
        client: Arc<Client>,
    ) -> Result<(), HubError> {
        match self.room(room) {
            Some(room) => room.unregister(client).await,
            None => Ok(()),
        }
    }

    /// Runs the handler registered for `event`'s type, if any.
    pub(crate) async fn dispatch(&self, client: &Arc<Client>, event: Event) {
        let handler = self
            .inner
            .handlers
            .get(&event.event_type)
            .map(|h| Arc::clone(h.value()));
        match handler {
            Some(handler) => handler(self.clone(), Arc::clone(client), event).await,
            None => {
                tracing::debug!(
                    client_id = %client.id(),
                    event_type = %event.event_type,
                    "no handler for event type"
                );
            }
        }
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.inner.registry.clients.len()
    }

    /// Looks up a registered client.
    pub fn client(&self, id: ClientId) -> Option<Arc<Client>> {
        self.inner
            .registry
            .clients
            .get(&id)
            .map(|c| Arc::clone(c.value()))
    }

    /// Looks up a room by name.
    pub fn room(&self, name: &str) -> Option<Arc<Room>> {
        self.inner
            .registry
            .rooms
            .get(name)
            .map(|r| Arc::clone(r.value()))
    }

    /// Names of all rooms, sorted.
    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .registry
            .rooms
            .iter()
            .map(|r| r.key().clone())
            .collect();
        names.sort();
        names
    }
}

/// The hub's coordinating task.
struct HubActor {
    registry: Arc<Registry>,
    register_rx: mpsc::Receiver<Arc<Client>>,
    unregister_rx: mpsc::Receiver<Arc<Client>>,
    broadcast_rx: mpsc::Receiver<Arc<Event>>,
}

impl HubActor {
    async fn run(mut self) {
        tracing::debug!("hub loop started");
        loop {
            tokio::select! {
                Some(client) = self.register_rx.recv() => self.handle_register(client),
                Some(client) = self.unregister_rx.recv() => self.handle_unregister(&client),
                Some(event) = self.broadcast_rx.recv() => self.handle_broadcast(&event),
                else => break,
            }
        }
        tracing::debug!("hub loop stopped");
    }

    fn handle_register(&self, client: Arc<Client>) {
        let id = client.id();
        // The two queues drain in no fixed order, so an unregister may
        // already have closed this client.
        if client.is_closed() {
            tracing::debug!(client_id = %id, "closed client not registered");
            return;
        }
        if self.registry.clients.contains_key(&id) {
            tracing::debug!(client_id = %id, "client already registered");
            return;
        }
        self.registry.clients.insert(id, client);
        tracing::debug!(
            client_id = %id,
            clients = self.registry.clients.len(),
            "client registered"
        );
    }

    fn handle_unregister(&self, client: &Client) {
        let id = client.id();
        let removed = self.registry.clients.remove(&id).is_some();

        // Closing is idempotent and must happen even for a client whose
        // registration has not been processed yet.
        let closed = client.close(|name| {
            if let Some(room) = self.registry.rooms.get(name) {
                room.remove_member(id);
                tracing::debug!(client_id = %id, room = %name, "client left the room");
            }
        });
        if !removed && !closed {
            return;
        }

        tracing::debug!(
            client_id = %id,
            clients = self.registry.clients.len(),
            "client unregistered"
        );
    }

    fn handle_broadcast(&self, event: &Arc<Event>) {
        for entry in self.registry.clients.iter() {
            if let Err(DeliveryError::Full) = entry.value().try_send(Arc::clone(event)) {
                tracing::warn!(client_id = %entry.key(), "event lost for client");
            }
        }
    }
}
