//! Wire events and inbound dispatch.
//!
//! Frames are adjacently tagged JSON: `{"event": <name>, "data": <payload>}`.
//! Events without a payload omit `data`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::registry::{ANONYMOUS, GUEST};
use crate::state::AppState;
use crate::typing::TYPING_DEBOUNCE;
use crate::ws::{fanout, ConnectionId};

/// Simulated latency on the welcome-message fetch.
pub const WELCOME_DELAY: Duration = Duration::from_millis(1500);

pub const WELCOME_MESSAGE: &str = "Welcome to the Simple WebSocket Chat!";

/// Events a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Identify the session. Missing or blank names fall back to "Guest".
    #[serde(rename = "set username")]
    SetUsername(Option<String>),
    /// Start or extend the typing indicator.
    #[serde(rename = "typing")]
    Typing,
    /// Broadcast a chat message; dropped if blank after trimming.
    #[serde(rename = "chat message")]
    ChatMessage(String),
    /// Message one specific connection.
    #[serde(rename = "private message")]
    PrivateMessage { to: ConnectionId, msg: String },
    /// Opaque reaction payload, rebroadcast verbatim.
    #[serde(rename = "reaction")]
    Reaction(Value),
}

/// Events the server emits.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "system message")]
    SystemMessage(String),
    /// Display name of the connection currently typing.
    #[serde(rename = "typing")]
    Typing(String),
    #[serde(rename = "stop typing")]
    StopTyping,
    #[serde(rename = "chat message")]
    ChatMessage(ChatMessage),
    #[serde(rename = "reaction")]
    Reaction(Value),
}

/// Transient chat payload; constructed per event, never stored.
#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub user: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
}

/// Handle one inbound text frame: decode and dispatch.
/// Malformed frames are logged and dropped; the session stays open.
pub fn handle_text_frame(text: &str, conn_id: ConnectionId, state: &AppState) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => dispatch(event, conn_id, state),
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, error = %e, "Dropping malformed frame");
        }
    }
}

/// Dispatch one decoded client event to its handler.
pub fn dispatch(event: ClientEvent, conn_id: ConnectionId, state: &AppState) {
    match event {
        ClientEvent::SetUsername(raw) => handle_set_username(raw, conn_id, state),
        ClientEvent::Typing => handle_typing(conn_id, state),
        ClientEvent::ChatMessage(msg) => handle_chat_message(msg, conn_id, state),
        ClientEvent::PrivateMessage { to, msg } => {
            handle_private_message(to, msg, conn_id, state)
        }
        ClientEvent::Reaction(data) => {
            fanout::broadcast_all(&state.connections, &ServerEvent::Reaction(data));
        }
    }
}

fn handle_set_username(raw: Option<String>, conn_id: ConnectionId, state: &AppState) {
    let name = state.registry.register(conn_id, raw.as_deref());
    tracing::info!(conn_id = %conn_id, name = %name, "Session identified");

    fanout::broadcast_others(
        &state.connections,
        conn_id,
        &ServerEvent::SystemMessage(format!("{name} has joined the chat!")),
    );

    // The welcome message arrives after a simulated fetch. Other connections'
    // events keep flowing while it is pending; if this session disconnects in
    // the meantime, delivery is a no-op.
    let state = state.clone();
    tokio::spawn(async move {
        let welcome = fetch_welcome_message().await;
        if state.registry.contains(conn_id) {
            fanout::send_to(
                &state.connections,
                conn_id,
                &ServerEvent::SystemMessage(welcome),
            );
        }
    });
}

/// Simulated async welcome-message fetch.
async fn fetch_welcome_message() -> String {
    tokio::time::sleep(WELCOME_DELAY).await;
    WELCOME_MESSAGE.to_string()
}

fn handle_typing(conn_id: ConnectionId, state: &AppState) {
    let name = state
        .registry
        .lookup(conn_id)
        .unwrap_or_else(|| ANONYMOUS.to_string());
    fanout::broadcast_others(&state.connections, conn_id, &ServerEvent::Typing(name));

    let table = state.connections.clone();
    state.typing.arm(conn_id, TYPING_DEBOUNCE, move || {
        fanout::broadcast_others(&table, conn_id, &ServerEvent::StopTyping);
    });
}

fn handle_chat_message(msg: String, conn_id: ConnectionId, state: &AppState) {
    // Empty messages are rejected silently, no error event.
    if msg.trim().is_empty() {
        return;
    }
    let user = state
        .registry
        .lookup(conn_id)
        .unwrap_or_else(|| GUEST.to_string());
    fanout::broadcast_all(
        &state.connections,
        &ServerEvent::ChatMessage(ChatMessage {
            user,
            msg,
            private: None,
        }),
    );
}

fn handle_private_message(to: ConnectionId, msg: String, conn_id: ConnectionId, state: &AppState) {
    let user = state
        .registry
        .lookup(conn_id)
        .unwrap_or_else(|| GUEST.to_string());
    fanout::unicast_or_notify(
        &state.connections,
        &state.registry,
        conn_id,
        to,
        &ServerEvent::ChatMessage(ChatMessage {
            user,
            msg,
            private: Some(true),
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::ConnectionTable;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio::time::advance;

    fn connect(table: &ConnectionTable) -> (ConnectionId, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::next();
        table.insert(id, tx);
        (id, rx)
    }

    fn recv_json(rx: &mut UnboundedReceiver<Message>) -> Option<serde_json::Value> {
        match rx.try_recv().ok()? {
            Message::Text(text) => serde_json::from_str(&text).ok(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_chat_message_produces_no_output() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);
        let (_b, mut rx_b) = connect(&state.connections);

        dispatch(ClientEvent::ChatMessage("   \t ".into()), a, &state);

        assert!(recv_json(&mut rx_a).is_none());
        assert!(recv_json(&mut rx_b).is_none());
    }

    #[tokio::test]
    async fn chat_message_broadcasts_to_all_with_sender_name() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);
        let (_b, mut rx_b) = connect(&state.connections);
        state.registry.register(a, Some("Alice"));

        dispatch(ClientEvent::ChatMessage("hi".into()), a, &state);

        for rx in [&mut rx_a, &mut rx_b] {
            let frame = recv_json(rx).expect("chat message delivered");
            assert_eq!(frame["event"], "chat message");
            assert_eq!(frame["data"]["user"], "Alice");
            assert_eq!(frame["data"]["msg"], "hi");
            assert!(frame["data"].get("private").is_none());
        }
    }

    #[tokio::test]
    async fn chat_message_from_unidentified_sender_uses_guest() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);

        dispatch(ClientEvent::ChatMessage("hello".into()), a, &state);

        let frame = recv_json(&mut rx_a).expect("chat message delivered");
        assert_eq!(frame["data"]["user"], GUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn set_username_notifies_others_then_welcomes_sender() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);
        let (_b, mut rx_b) = connect(&state.connections);

        dispatch(ClientEvent::SetUsername(Some("Alice".into())), a, &state);

        let frame = recv_json(&mut rx_b).expect("join notice to others");
        assert_eq!(frame["event"], "system message");
        assert_eq!(frame["data"], "Alice has joined the chat!");
        assert!(recv_json(&mut rx_a).is_none());

        // Let the welcome task register its sleep before moving the clock.
        tokio::task::yield_now().await;
        advance(WELCOME_DELAY).await;
        tokio::task::yield_now().await;

        let frame = recv_json(&mut rx_a).expect("welcome to sender");
        assert_eq!(frame["event"], "system message");
        assert_eq!(frame["data"], WELCOME_MESSAGE);
        assert!(recv_json(&mut rx_b).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn welcome_is_dropped_when_sender_disconnects_first() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);

        dispatch(ClientEvent::SetUsername(Some("Alice".into())), a, &state);

        // Disconnect before the welcome fetch resolves.
        state.connections.remove(&a);
        state.registry.remove(a);

        tokio::task::yield_now().await;
        advance(WELCOME_DELAY).await;
        tokio::task::yield_now().await;
        assert!(recv_json(&mut rx_a).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn typing_notifies_others_and_debounces_stop() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);
        let (_b, mut rx_b) = connect(&state.connections);

        dispatch(ClientEvent::Typing, a, &state);

        let frame = recv_json(&mut rx_b).expect("typing indicator");
        assert_eq!(frame["event"], "typing");
        assert_eq!(frame["data"], ANONYMOUS);
        assert!(recv_json(&mut rx_a).is_none());

        tokio::task::yield_now().await;
        advance(TYPING_DEBOUNCE).await;
        tokio::task::yield_now().await;

        let frame = recv_json(&mut rx_b).expect("stop typing after debounce");
        assert_eq!(frame["event"], "stop typing");
        assert!(recv_json(&mut rx_a).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn second_typing_event_resets_the_debounce() {
        let state = AppState::new();
        let (a, _rx_a) = connect(&state.connections);
        let (_b, mut rx_b) = connect(&state.connections);

        dispatch(ClientEvent::Typing, a, &state);
        tokio::task::yield_now().await;
        advance(Duration::from_millis(1000)).await;
        dispatch(ClientEvent::Typing, a, &state);
        tokio::task::yield_now().await;

        // Two typing indicators so far, no stop.
        assert_eq!(recv_json(&mut rx_b).unwrap()["event"], "typing");
        assert_eq!(recv_json(&mut rx_b).unwrap()["event"], "typing");

        // 2999 ms after the first event, 1999 ms after the last: still quiet.
        advance(Duration::from_millis(1999)).await;
        tokio::task::yield_now().await;
        assert!(recv_json(&mut rx_b).is_none());

        advance(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        let frame = recv_json(&mut rx_b).expect("single stop typing");
        assert_eq!(frame["event"], "stop typing");
        assert!(recv_json(&mut rx_b).is_none());
    }

    #[tokio::test]
    async fn private_message_to_unknown_target_errors_to_sender_only() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);
        let (_b, mut rx_b) = connect(&state.connections);

        dispatch(
            ClientEvent::PrivateMessage {
                to: ConnectionId::next(),
                msg: "psst".into(),
            },
            a,
            &state,
        );

        let frame = recv_json(&mut rx_a).expect("error reply");
        assert_eq!(frame["event"], "system message");
        assert_eq!(frame["data"], fanout::USER_NOT_FOUND);
        assert!(recv_json(&mut rx_a).is_none());
        assert!(recv_json(&mut rx_b).is_none());
    }

    #[tokio::test]
    async fn private_message_reaches_target_with_private_flag() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);
        let (b, mut rx_b) = connect(&state.connections);
        state.registry.register(a, Some("Alice"));
        state.registry.register(b, Some("Bob"));

        dispatch(
            ClientEvent::PrivateMessage {
                to: b,
                msg: "psst".into(),
            },
            a,
            &state,
        );

        let frame = recv_json(&mut rx_b).expect("private delivery");
        assert_eq!(frame["event"], "chat message");
        assert_eq!(frame["data"]["user"], "Alice");
        assert_eq!(frame["data"]["msg"], "psst");
        assert_eq!(frame["data"]["private"], true);
        assert!(recv_json(&mut rx_a).is_none());
    }

    #[tokio::test]
    async fn reaction_rebroadcasts_verbatim_to_all() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);
        let (_b, mut rx_b) = connect(&state.connections);

        let payload = serde_json::json!({"messageId": 7, "emoji": "🔥"});
        dispatch(ClientEvent::Reaction(payload.clone()), a, &state);

        for rx in [&mut rx_a, &mut rx_b] {
            let frame = recv_json(rx).expect("reaction delivered");
            assert_eq!(frame["event"], "reaction");
            assert_eq!(frame["data"], payload);
        }
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_without_output() {
        let state = AppState::new();
        let (a, mut rx_a) = connect(&state.connections);

        handle_text_frame("not json at all", a, &state);
        handle_text_frame(r#"{"event": "no such event"}"#, a, &state);

        assert!(recv_json(&mut rx_a).is_none());
    }

    #[test]
    fn client_event_decodes_wire_payloads() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event": "set username", "data": "Alice"}"#).unwrap();
        assert!(matches!(event, ClientEvent::SetUsername(Some(ref n)) if n == "Alice"));

        let event: ClientEvent = serde_json::from_str(r#"{"event": "typing"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Typing));

        let event: ClientEvent =
            serde_json::from_str(r#"{"event": "private message", "data": {"to": 3, "msg": "x"}}"#)
                .unwrap();
        assert!(matches!(event, ClientEvent::PrivateMessage { .. }));
    }

    #[test]
    fn server_event_encodes_wire_payloads() {
        let frame = serde_json::to_value(&ServerEvent::StopTyping).unwrap();
        assert_eq!(frame, serde_json::json!({"event": "stop typing"}));

        let frame = serde_json::to_value(&ServerEvent::ChatMessage(ChatMessage {
            user: "Alice".into(),
            msg: "hi".into(),
            private: None,
        }))
        .unwrap();
        assert_eq!(
            frame,
            serde_json::json!({"event": "chat message", "data": {"user": "Alice", "msg": "hi"}})
        );
    }
}
