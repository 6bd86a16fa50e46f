use std::sync::Arc;

use crate::registry::UserRegistry;
use crate::typing::TypingTimers;
use crate::ws::{new_connection_table, ConnectionTable};

/// Shared application state passed to all handlers via axum State extractor.
/// Lifetime = server process; all mutation goes through the concurrent maps
/// inside, never ambient globals.
#[derive(Clone)]
pub struct AppState {
    /// Live connection senders, one per open WebSocket.
    pub connections: ConnectionTable,
    /// Display names for identified sessions.
    pub registry: Arc<UserRegistry>,
    /// Pending typing-stop debounce timers.
    pub typing: Arc<TypingTimers>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            connections: new_connection_table(),
            registry: Arc::new(UserRegistry::new()),
            typing: Arc::new(TypingTimers::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
