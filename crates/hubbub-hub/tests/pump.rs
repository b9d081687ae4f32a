//! Connection pump tests driven over in-memory and WebSocket connections.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{hub_with_rooms, settle};
use hubbub_hub::{Client, ClientConfig, Hub};
use hubbub_protocol::Event;
use hubbub_transport::memory::{self, MemoryPeer};
use hubbub_transport::{CloseFrame, Frame};
use serde_json::json;

/// A hub with a `chat` room and the usual subscribe and relay handlers.
fn chat_hub() -> Hub {
    let hub = hub_with_rooms(&["chat"]);
    hub.on("subscribe:chat", |hub: Hub, client: Arc<Client>, _event: Event| async move {
        hub.subscribe("chat", client).await.ok();
    });
    hub.on("unsubscribe:chat", |hub: Hub, client: Arc<Client>, _event: Event| async move {
        hub.unsubscribe("chat", client).await.ok();
    });
    hub.on("chat:message", |hub: Hub, _client: Arc<Client>, event: Event| async move {
        hub.broadcast_to_room("chat", event).await.ok();
    });
    hub
}

async fn connect(hub: &Hub, config: &ClientConfig) -> (Arc<Client>, MemoryPeer) {
    let (conn, peer) = memory::pair();
    let client = hub.on_connect(conn, config).await.unwrap();
    let client_id = client.id();
    assert!(settle(|| hub.client(client_id).is_some()).await);
    (client, peer)
}

/// Next text frame from the server, skipping keepalive pings.
async fn next_text(peer: &mut MemoryPeer) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), peer.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("server writer gone");
        match frame {
            Frame::Text(text) => return text,
            Frame::Ping(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_inbound_events_reach_handlers_and_room() {
    let hub = chat_hub();
    let (alice, alice_peer) = connect(&hub, &ClientConfig::default()).await;
    let (bob, mut bob_peer) = connect(&hub, &ClientConfig::default()).await;

    alice_peer.send(Frame::text(r#"["subscribe:chat"]"#)).unwrap();
    bob_peer.send(Frame::text(r#"["subscribe:chat"]"#)).unwrap();
    assert!(settle(|| alice.in_room("chat") && bob.in_room("chat")).await);

    alice_peer
        .send(Frame::text("[\"chat:message\",\n {\"message\": \"hi\"}]\n"))
        .unwrap();

    let text = next_text(&mut bob_peer).await;
    let event = Event::from_slice(text.as_bytes()).unwrap();
    assert_eq!(event.event_type, "chat:message");
    assert_eq!(event.payload, Some(json!({"message": "hi"})));
}

#[tokio::test]
async fn test_binary_frames_are_decoded_too() {
    let hub = chat_hub();
    let (client, peer) = connect(&hub, &ClientConfig::default()).await;

    peer.send(Frame::Binary(br#"["subscribe:chat"]"#.to_vec())).unwrap();
    assert!(settle(|| client.in_room("chat")).await);
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let hub = chat_hub();
    let (client, peer) = connect(&hub, &ClientConfig::default()).await;

    for junk in ["not json", "[]", r#"{"type":"x"}"#, r#"["a",1,2]"#, r#"[""]"#] {
        peer.send(Frame::text(junk)).unwrap();
    }
    peer.send(Frame::text(r#"["subscribe:chat"]"#)).unwrap();

    assert!(settle(|| client.in_room("chat")).await);
    assert_eq!(hub.client_count(), 1);
}

#[tokio::test]
async fn test_unknown_event_type_is_ignored() {
    let hub = chat_hub();
    let (client, peer) = connect(&hub, &ClientConfig::default()).await;

    peer.send(Frame::text(r#"["roulette:spin", 3]"#)).unwrap();
    peer.send(Frame::text(r#"["subscribe:chat"]"#)).unwrap();

    assert!(settle(|| client.in_room("chat")).await);
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_oversized_message_disconnects() {
    let hub = chat_hub();
    let config = ClientConfig {
        max_message_size: 32,
        ..ClientConfig::default()
    };
    let (client, mut peer) = connect(&hub, &config).await;

    let big = format!(r#"["chat:message","{}"]"#, "x".repeat(64));
    peer.send(Frame::text(big)).unwrap();

    assert!(settle(|| client.is_closed()).await);
    assert_eq!(hub.client_count(), 0);

    let frame = loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), peer.recv())
            .await
            .unwrap()
            .unwrap();
        if !matches!(frame, Frame::Ping(_)) {
            break frame;
        }
    };
    match frame {
        Frame::Close(Some(close)) => assert_eq!(close.code, CloseFrame::TOO_BIG),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_peer_close_unregisters_and_leaves_rooms() {
    let hub = chat_hub();
    let (client, mut peer) = connect(&hub, &ClientConfig::default()).await;

    peer.send(Frame::text(r#"["subscribe:chat"]"#)).unwrap();
    assert!(settle(|| client.in_room("chat")).await);

    peer.close();

    assert!(settle(|| hub.client_count() == 0).await);
    assert!(client.rooms().is_empty());
    assert_eq!(hub.room("chat").unwrap().member_count(), 0);
}

#[tokio::test]
async fn test_close_frame_from_peer_unregisters() {
    let hub = chat_hub();
    let (client, peer) = connect(&hub, &ClientConfig::default()).await;

    peer.send(Frame::Close(Some(CloseFrame::new(CloseFrame::GOING_AWAY, "bye"))))
        .unwrap();

    assert!(settle(|| client.is_closed()).await);
}

#[tokio::test]
async fn test_hub_unregister_sends_close_frame() {
    let hub = chat_hub();
    let (client, mut peer) = connect(&hub, &ClientConfig::default()).await;

    hub.unregister(Arc::clone(&client)).await.unwrap();

    let frame = loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), peer.recv())
            .await
            .unwrap()
            .unwrap();
        if !matches!(frame, Frame::Ping(_)) {
            break frame;
        }
    };
    match frame {
        Frame::Close(Some(close)) => assert_eq!(close.code, CloseFrame::NORMAL),
        other => panic!("expected close frame, got {other:?}"),
    }
    // Both pumps are gone once the writer half is dropped.
    let rest = tokio::time::timeout(Duration::from_secs(2), peer.recv()).await.unwrap();
    assert!(rest.is_none());
}

#[tokio::test]
async fn test_missing_pong_expires_read_deadline() {
    let hub = chat_hub();
    let config = ClientConfig {
        pong_wait_ms: 100,
        ..ClientConfig::default()
    };
    let (client, _peer) = connect(&hub, &config).await;

    assert!(settle(|| client.is_closed()).await);
    assert_eq!(hub.client_count(), 0);
}

#[tokio::test]
async fn test_pongs_keep_connection_alive() {
    let hub = chat_hub();
    let config = ClientConfig {
        pong_wait_ms: 200,
        ..ClientConfig::default()
    };
    let (client, mut peer) = connect(&hub, &config).await;

    let responder = tokio::spawn(async move {
        let mut pings = 0;
        while let Some(frame) = peer.recv().await {
            if let Frame::Ping(data) = frame {
                pings += 1;
                if peer.send(Frame::Pong(data)).is_err() {
                    break;
                }
            }
        }
        pings
    });

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(!client.is_closed(), "answered pings should keep the client");
    assert_eq!(hub.client_count(), 1);

    hub.unregister(Arc::clone(&client)).await.unwrap();
    let pings = tokio::time::timeout(Duration::from_secs(2), responder)
        .await
        .unwrap()
        .unwrap();
    assert!(pings >= 2, "expected periodic pings, got {pings}");
}

mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use hubbub_transport::{Transport, TransportConfig, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    use super::*;

    #[tokio::test]
    async fn test_chat_round_trip_over_websocket() {
        let hub = chat_hub();
        let mut transport = WebSocketTransport::bind("127.0.0.1:0", TransportConfig::default())
            .await
            .unwrap();
        let addr = transport.local_addr().unwrap();

        let accept_hub = hub.clone();
        tokio::spawn(async move {
            while let Ok(conn) = transport.accept().await {
                accept_hub
                    .on_connect(conn, &ClientConfig::default())
                    .await
                    .unwrap();
            }
        });

        let url = format!("ws://{addr}");
        let (mut alice, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let (mut bob, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

        alice.send(Message::text(r#"["subscribe:chat"]"#)).await.unwrap();
        bob.send(Message::text(r#"["subscribe:chat"]"#)).await.unwrap();
        let room = hub.room("chat").unwrap();
        assert!(settle(|| room.member_count() == 2).await);

        alice
            .send(Message::text(r#"["chat:message",{"message":"hello"}]"#))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), bob.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let event = Event::from_slice(received.into_text().unwrap().as_bytes()).unwrap();
        assert_eq!(event.event_type, "chat:message");
        assert_eq!(event.payload, Some(json!({"message": "hello"})));

        alice.close(None).await.unwrap();
        assert!(settle(|| room.member_count() == 1).await);
    }
}
