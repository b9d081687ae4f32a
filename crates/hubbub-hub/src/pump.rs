//! Per-connection read and write pumps.
//!
//! Every admitted connection is split and driven by two tasks sharing one
//! [`Client`]:
//!
//! - the **reader** enforces the read deadline (refreshed by each keepalive
//!   acknowledgment), decodes frames into events and runs their handlers;
//! - the **writer** drains the outbound queue and sends a keepalive ping
//!   every `ping_interval`.
//!
//! Either pump asks the hub to unregister the client when its side of the
//! transport fails. When the hub tears the client down first, the closed
//! outbound queue makes the writer send a close frame and exit, and the
//! client's close signal stops the reader.

use std::sync::Arc;
use std::time::Duration;

use hubbub_protocol::Event;
use hubbub_transport::{CloseFrame, Connection, Frame, FrameReader, FrameWriter};
use tokio::sync::oneshot;
use tokio::time::{self, Instant};

use crate::{Client, ClientConfig, Hub, Outbound};

/// Splits `conn` and spawns its reader and writer tasks.
pub(crate) fn spawn<C: Connection>(
    hub: Hub,
    client: Arc<Client>,
    outbound: Outbound,
    conn: C,
    config: &ClientConfig,
) {
    let (reader, writer) = conn.split();
    // Lets the reader choose the close frame the writer sends.
    let (close_tx, close_rx) = oneshot::channel();
    tokio::spawn(read_loop(
        hub.clone(),
        Arc::clone(&client),
        reader,
        close_tx,
        config.pong_wait(),
        config.max_message_size,
    ));
    tokio::spawn(write_loop(
        hub,
        client,
        writer,
        outbound,
        close_rx,
        config.ping_interval(),
    ));
}

/// Why the reader stopped.
enum ReadEnd {
    /// The hub closed the client; cleanup is already under way.
    Closed,
    /// The transport failed, timed out or was closed by the peer.
    Transport,
    /// The peer sent a message over the read limit.
    TooLarge,
}

async fn read_loop<R: FrameReader>(
    hub: Hub,
    client: Arc<Client>,
    mut reader: R,
    close_tx: oneshot::Sender<CloseFrame>,
    pong_wait: Duration,
    max_message_size: usize,
) {
    let id = client.id();
    let end = read_frames(&hub, &client, &mut reader, pong_wait, max_message_size).await;
    if let ReadEnd::TooLarge = end {
        // Sent before unregistering, so the writer sees it once the
        // outbound queue closes.
        let _ = close_tx.send(CloseFrame::new(CloseFrame::TOO_BIG, "message too large"));
    }
    if !matches!(end, ReadEnd::Closed) {
        if let Err(e) = hub.unregister(client).await {
            tracing::debug!(client_id = %id, error = %e, "unregister after read failure");
        }
    }
    tracing::debug!(client_id = %id, "reader stopped");
}

async fn read_frames<R: FrameReader>(
    hub: &Hub,
    client: &Arc<Client>,
    reader: &mut R,
    pong_wait: Duration,
    max_message_size: usize,
) -> ReadEnd {
    let id = client.id();
    let mut closed = client.closed_signal();
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let read = tokio::select! {
            _ = closed.wait_for(|closed| *closed) => return ReadEnd::Closed,
            read = time::timeout_at(deadline, reader.recv()) => read,
        };

        let frame = match read {
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => {
                tracing::debug!(client_id = %id, "connection closed by peer");
                return ReadEnd::Transport;
            }
            Ok(Err(e)) => {
                tracing::info!(client_id = %id, error = %e, "read failed");
                return ReadEnd::Transport;
            }
            Err(_) => {
                tracing::info!(client_id = %id, "read deadline expired");
                return ReadEnd::Transport;
            }
        };

        let data = match &frame {
            Frame::Pong(_) => {
                deadline = Instant::now() + pong_wait;
                continue;
            }
            // Answered by the transport.
            Frame::Ping(_) => continue,
            Frame::Close(close) => {
                tracing::debug!(
                    client_id = %id,
                    code = close.as_ref().map(|c| c.code),
                    "close frame received"
                );
                return ReadEnd::Transport;
            }
            Frame::Text(_) | Frame::Binary(_) => frame.data().unwrap_or_default(),
        };

        if data.len() > max_message_size {
            tracing::info!(
                client_id = %id,
                size = data.len(),
                limit = max_message_size,
                "message exceeds read limit"
            );
            return ReadEnd::TooLarge;
        }

        let message = normalize(data);
        let event = match Event::from_slice(&message) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(client_id = %id, error = %e, "malformed event skipped");
                continue;
            }
        };
        tracing::debug!(
            client_id = %id,
            message = %String::from_utf8_lossy(&message),
            "incoming message"
        );

        hub.dispatch(client, event).await;
    }
}

/// Replaces newlines with spaces and trims surrounding whitespace.
fn normalize(data: &[u8]) -> Vec<u8> {
    let flat: Vec<u8> = data
        .iter()
        .map(|&b| if b == b'\n' { b' ' } else { b })
        .collect();
    flat.trim_ascii().to_vec()
}

async fn write_loop<W: FrameWriter>(
    hub: Hub,
    client: Arc<Client>,
    mut writer: W,
    mut outbound: Outbound,
    mut close_rx: oneshot::Receiver<CloseFrame>,
    ping_interval: Duration,
) {
    let id = client.id();
    let mut ticker = time::interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = writer.send(Frame::Ping(Vec::new())).await {
                    tracing::info!(client_id = %id, error = %e, "keepalive ping failed");
                    break;
                }
            }
            next = outbound.recv() => {
                let Some(event) = next else {
                    let close = close_rx
                        .try_recv()
                        .unwrap_or_else(|_| CloseFrame::new(CloseFrame::NORMAL, ""));
                    let close = Frame::Close(Some(close));
                    if let Err(e) = writer.send(close).await {
                        tracing::info!(client_id = %id, error = %e, "close frame not sent");
                    }
                    tracing::debug!(client_id = %id, "writer stopped");
                    return;
                };

                let message = match event.to_json() {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::error!(client_id = %id, error = %e, "outgoing event not encodable");
                        continue;
                    }
                };
                tracing::debug!(client_id = %id, %message, "outgoing message");

                if let Err(e) = writer.send(Frame::Text(message)).await {
                    tracing::warn!(client_id = %id, error = %e, "write failed");
                    break;
                }
            }
        }
    }

    if let Err(e) = hub.unregister(client).await {
        tracing::debug!(client_id = %id, error = %e, "unregister after write failure");
    }
    tracing::debug!(client_id = %id, "writer stopped");
}
