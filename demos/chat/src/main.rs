use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hubbub::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageIn {
    pub from: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageOut {
    pub from: String,
    pub message: String,
    pub sent: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Joins the room named after the colon: `subscribe:chat` joins `chat`.
async fn subscribe(hub: Hub, client: Arc<Client>, event: Event) {
    let Some((_, room)) = event.event_type.split_once(':') else {
        return;
    };
    if let Err(e) = hub.subscribe(room, client).await {
        tracing::error!(room, error = %e, "subscribe failed");
    }
}

async fn unsubscribe(hub: Hub, client: Arc<Client>, event: Event) {
    let Some((_, room)) = event.event_type.split_once(':') else {
        return;
    };
    if let Err(e) = hub.unsubscribe(room, client).await {
        tracing::error!(room, error = %e, "unsubscribe failed");
    }
}

/// Stamps the message with the server time and relays it to the chat room.
async fn chat_message(hub: Hub, client: Arc<Client>, event: Event) {
    let incoming: ChatMessageIn = match event.decode_payload() {
        Ok(msg) => msg,
        Err(e) => {
            tracing::error!(client_id = %client.id(), payload = ?event.payload, error = %e, "bad chat message");
            return;
        }
    };

    let outgoing = ChatMessageOut {
        from: incoming.from,
        message: incoming.message,
        sent: Utc::now(),
    };
    if let Err(e) = hub.publish("chat:message", &outgoing).await {
        tracing::error!(error = %e, "chat message not published");
    }
}

fn install_handlers(hub: &Hub) {
    hub.on("subscribe:chat", subscribe);
    hub.on("subscribe:roulette", subscribe);
    hub.on("unsubscribe:chat", unsubscribe);
    hub.on("unsubscribe:roulette", unsubscribe);
    hub.on("chat:message", chat_message);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    hubbub::telemetry::init();

    let settings_path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = Settings::load(settings_path.as_deref())?;

    let server = HubServerBuilder::from_settings(settings)
        .rooms(["chat"])
        .build()
        .await?;
    install_handlers(server.hub());

    tracing::info!(addr = %server.local_addr()?, "chat server listening");
    server
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
