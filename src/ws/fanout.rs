//! Recipient-set policies for outbound events.
//!
//! Translates a logical delivery intent (broadcast-all, broadcast-others,
//! unicast) into sends against the connection table. Fire-and-forget:
//! connections that close mid-fan-out are simply skipped.

use axum::extract::ws::Message;

use crate::registry::UserRegistry;
use crate::ws::protocol::ServerEvent;
use crate::ws::{ConnectionId, ConnectionTable};

/// Error notice sent back when a private message targets an unknown connection.
pub const USER_NOT_FOUND: &str = "⚠️ User not found.";

fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode outbound event");
            None
        }
    }
}

/// Deliver to every live connection, sender included.
/// Used for chat messages and reactions (global visibility is intentional).
pub fn broadcast_all(table: &ConnectionTable, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };
    for entry in table.iter() {
        let _ = entry.value().send(msg.clone());
    }
}

/// Deliver to every live connection except `sender`.
/// Used for join/leave system messages and typing indicators.
pub fn broadcast_others(table: &ConnectionTable, sender: ConnectionId, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };
    for entry in table.iter() {
        if *entry.key() == sender {
            continue;
        }
        let _ = entry.value().send(msg.clone());
    }
}

/// Deliver to one specific connection. Unknown or closed connections are
/// skipped.
pub fn send_to(table: &ConnectionTable, id: ConnectionId, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };
    if let Some(sender) = table.get(&id) {
        let _ = sender.send(msg);
    }
}

/// Deliver to `target` if it has an identified session; otherwise answer
/// `sender` with a [`USER_NOT_FOUND`] system message. A missing target is
/// converted to an error reply, never dropped silently.
pub fn unicast_or_notify(
    table: &ConnectionTable,
    registry: &UserRegistry,
    sender: ConnectionId,
    target: ConnectionId,
    event: &ServerEvent,
) {
    if registry.contains(target) {
        send_to(table, target, event);
    } else {
        send_to(
            table,
            sender,
            &ServerEvent::SystemMessage(USER_NOT_FOUND.to_string()),
        );
    }
}
