//! Actor-per-connection session lifecycle.
//!
//! Each WebSocket gets one actor that owns its session from accept to close:
//! Connected (table entry, no registry entry) → Identified/Active (registry
//! entry after `set username`) → Disconnected (table + registry + timer
//! cleanup, departure notice).

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::AppState;
use crate::ws::protocol::{self, ServerEvent};
use crate::ws::{fanout, ConnectionId};

/// Ping interval: server sends a WebSocket ping every 30 seconds so abrupt
/// disconnects cannot leak table entries.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Close the connection if no pong arrives within this window after a ping.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor for one WebSocket connection.
///
/// Splits the socket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from an mpsc channel
/// - Reader loop: decodes inbound frames and dispatches them
///
/// The mpsc sender is registered in the connection table so any handler can
/// push frames to this client.
pub async fn run_connection(socket: WebSocket, state: AppState, conn_id: ConnectionId) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    state.connections.insert(conn_id, tx.clone());
    tracing::info!(conn_id = %conn_id, "Connection established");

    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Ping task: periodic pings, close if the pong never comes back.
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!(conn_id = %conn_id, "Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(None));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket frames.
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_frame(&text, conn_id, &state);
                }
                Message::Binary(_) => {
                    tracing::debug!(conn_id = %conn_id, "Ignoring binary frame");
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(conn_id = %conn_id, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(conn_id = %conn_id, "WebSocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();
    ping_handle.abort();
    disconnect_cleanup(&state, conn_id);
}

/// Writer task: receives frames from the mpsc channel and forwards them to
/// the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}

/// Tear down a session: drop its sender, cancel any pending typing timer,
/// and unregister. An identified session produces a departure notice for
/// everyone else; one that never identified leaves silently.
pub fn disconnect_cleanup(state: &AppState, conn_id: ConnectionId) {
    state.connections.remove(&conn_id);
    state.typing.disarm(conn_id);

    match state.registry.remove(conn_id) {
        Some(name) => {
            tracing::info!(conn_id = %conn_id, name = %name, "User disconnected");
            fanout::broadcast_others(
                &state.connections,
                conn_id,
                &ServerEvent::SystemMessage(format!("{name} has left the chat.")),
            );
        }
        None => {
            tracing::info!(conn_id = %conn_id, "Connection closed before identifying");
        }
    }
}
