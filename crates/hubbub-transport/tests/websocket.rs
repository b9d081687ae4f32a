//! Integration tests for the WebSocket transport.
//!
//! These spin up a real WebSocket listener on an OS-assigned port and
//! drive it with a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use hubbub_transport::{
        CloseFrame, Connection, Frame, FrameReader, FrameWriter, Transport,
        TransportConfig, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn bind(config: TransportConfig) -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0", config)
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_exchange_frames() {
        let (mut transport, addr) = bind(TransportConfig::default()).await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");
        assert!(server_conn.id().get() > 0);

        let (mut reader, mut writer) = server_conn.split();

        // Server sends, client receives.
        writer
            .send(Frame::text("hello from server"))
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "hello from server");

        // Client sends, server receives.
        client_ws
            .send(Message::text("hello from client"))
            .await
            .unwrap();
        let received = reader
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have a frame");
        assert_eq!(received, Frame::text("hello from client"));
    }

    #[tokio::test]
    async fn test_websocket_reader_sees_pong_for_server_ping() {
        let (mut transport, addr) = bind(TransportConfig::default()).await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client_ws = connect_client(&addr).await;
        let (mut reader, mut writer) = server_handle.await.unwrap().split();

        writer.send(Frame::Ping(b"heartbeat".to_vec())).await.unwrap();

        // Polling the client stream lets tungstenite answer the ping.
        let client = tokio::spawn(async move {
            let msg = client_ws.next().await.unwrap().unwrap();
            assert!(matches!(msg, Message::Ping(_)));
            client_ws.flush().await.unwrap();
            client_ws
        });

        let frame = reader.recv().await.unwrap().unwrap();
        assert_eq!(frame, Frame::Pong(b"heartbeat".to_vec()));
        drop(client.await.unwrap());
    }

    #[tokio::test]
    async fn test_websocket_close_frame_carries_code() {
        let (mut transport, addr) = bind(TransportConfig::default()).await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client_ws = connect_client(&addr).await;
        let (_reader, mut writer) = server_handle.await.unwrap().split();

        writer
            .send(Frame::Close(Some(CloseFrame::new(
                CloseFrame::NORMAL,
                "bye",
            ))))
            .await
            .unwrap();

        let msg = client_ws.next().await.unwrap().unwrap();
        let Message::Close(Some(close)) = msg else {
            panic!("expected close frame, got {msg:?}");
        };
        assert_eq!(u16::from(close.code), CloseFrame::NORMAL);
        assert_eq!(close.reason.as_str(), "bye");
    }

    #[tokio::test]
    async fn test_websocket_client_close_is_reported() {
        let (mut transport, addr) = bind(TransportConfig::default()).await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client_ws = connect_client(&addr).await;
        let (mut reader, _writer) = server_handle.await.unwrap().split();

        client_ws.send(Message::Close(None)).await.unwrap();

        let frame = reader.recv().await.expect("recv should not error");
        assert!(
            matches!(frame, Some(Frame::Close(_)) | None),
            "should observe the close, got {frame:?}"
        );
    }

    #[tokio::test]
    async fn test_websocket_oversized_message_is_an_error() {
        let config = TransportConfig {
            max_message_size: 16,
            max_frame_size: 16,
            ..TransportConfig::default()
        };
        let (mut transport, addr) = bind(config).await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client_ws = connect_client(&addr).await;
        let (mut reader, _writer) = server_handle.await.unwrap().split();

        client_ws
            .send(Message::text("x".repeat(64)))
            .await
            .unwrap();

        assert!(reader.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_idle_socket_times_out_during_upgrade() {
        let config = TransportConfig {
            handshake_timeout: std::time::Duration::from_millis(100),
            ..TransportConfig::default()
        };
        let (mut transport, addr) = bind(config).await;

        let _idle = tokio::net::TcpStream::connect(&addr).await.unwrap();
        let incoming = transport.accept_incoming().await.unwrap();
        assert!(incoming.peer_addr().port() > 0);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            incoming.upgrade(),
        )
        .await
        .expect("upgrade should give up on its own");
        assert!(matches!(
            result,
            Err(hubbub_transport::TransportError::Handshake(_))
        ));
    }
}
