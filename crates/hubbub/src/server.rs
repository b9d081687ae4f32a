//! `HubServer` builder and accept loop.
//!
//! The server owns the WebSocket listener and a [`Hub`]. The accept loop
//! only takes TCP connections; each one is upgraded on its own task and
//! then handed to [`Hub::on_connect`], which registers a client and starts
//! its pumps. A peer that stalls its handshake delays nobody else.

use std::future::Future;
use std::net::SocketAddr;

use hubbub_hub::{ClientConfig, Hub, HubConfig, RoomConfig};
use hubbub_transport::{Incoming, TransportConfig, WebSocketTransport};

use crate::{HubbubError, Settings};

/// Builder for configuring and starting a hub server.
///
/// # Example
///
/// ```rust,ignore
/// let server = HubServer::builder()
///     .bind("0.0.0.0:8080")
///     .rooms(["chat", "roulette"])
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct HubServerBuilder {
    bind_addr: String,
    rooms: Vec<String>,
    hub: HubConfig,
    room: RoomConfig,
    client: ClientConfig,
    transport: TransportConfig,
}

impl HubServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::from_settings(Settings::default())
    }

    /// Creates a builder from loaded [`Settings`].
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            bind_addr: settings.bind_addr,
            rooms: settings.rooms,
            hub: settings.hub,
            room: settings.room,
            client: settings.client,
            transport: TransportConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Adds rooms to create at startup.
    pub fn rooms<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rooms.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.hub = config;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room = config;
        self
    }

    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client = config;
        self
    }

    /// Sets WebSocket-level limits applied during the handshake.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// Binds the listener, starts the hub and creates the startup rooms.
    ///
    /// # Errors
    /// [`HubbubError::Transport`] if the address cannot be bound.
    pub async fn build(self) -> Result<HubServer, HubbubError> {
        let transport = WebSocketTransport::bind(&self.bind_addr, self.transport).await?;

        let hub = Hub::new(&self.hub);
        hub.create_rooms(self.rooms, &self.room);

        Ok(HubServer {
            transport,
            hub,
            client: self.client.validated(),
        })
    }
}

impl Default for HubServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound hub server.
///
/// Install handlers through [`hub()`](Self::hub), then call
/// [`run()`](Self::run) to start accepting connections.
pub struct HubServer {
    transport: WebSocketTransport,
    hub: Hub,
    client: ClientConfig,
}

impl HubServer {
    /// Creates a new builder.
    pub fn builder() -> HubServerBuilder {
        HubServerBuilder::new()
    }

    /// The hub shared by every connection.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), HubbubError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Connections already admitted keep running on their own tasks.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), HubbubError> {
        match self.local_addr() {
            Ok(addr) => tracing::info!(%addr, rooms = ?self.hub.room_names(), "hubbub server running"),
            Err(_) => tracing::info!("hubbub server running"),
        }

        tokio::pin!(shutdown);
        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("hubbub server shutting down");
                    return Ok(());
                }
                accepted = self.transport.accept_incoming() => accepted,
            };

            match accepted {
                Ok(incoming) => {
                    tokio::spawn(admit(self.hub.clone(), incoming, self.client.clone()));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Upgrades one connection and registers it with the hub.
async fn admit(hub: Hub, incoming: Incoming, config: ClientConfig) {
    let addr = incoming.peer_addr();
    let conn = match incoming.upgrade().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::info!(%addr, error = %e, "connection dropped before upgrade");
            return;
        }
    };
    if let Err(e) = hub.on_connect(conn, &config).await {
        tracing::error!(%addr, error = %e, "connection not admitted");
    }
}
