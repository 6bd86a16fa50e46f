//! Display-name registry: which live connections have identified themselves.
//!
//! A connection appears here if and only if it has sent `set username` and
//! has not yet disconnected. Names are not unique across connections, so
//! private messaging targets a ConnectionId, never a name.

use dashmap::DashMap;

use crate::ws::ConnectionId;

/// Default display name for a session that identified with an empty name,
/// and the self-referential fallback for sessions that never identified.
pub const GUEST: &str = "Guest";

/// Fallback name when an unidentified session emits a typing indicator.
pub const ANONYMOUS: &str = "Anonymous";

/// Connection → display name mapping.
#[derive(Debug, Default)]
pub struct UserRegistry {
    names: DashMap<ConnectionId, String>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the display name for a connection, trimming whitespace and
    /// falling back to [`GUEST`] when empty or absent. Overwrites any
    /// previous name for the same connection. Returns the stored name.
    pub fn register(&self, id: ConnectionId, raw: Option<&str>) -> String {
        let name = raw
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(GUEST)
            .to_string();
        self.names.insert(id, name.clone());
        name
    }

    /// Display name of an identified connection, or None if it never
    /// identified. Callers pick a context-appropriate default on miss.
    pub fn lookup(&self, id: ConnectionId) -> Option<String> {
        self.names.get(&id).map(|entry| entry.value().clone())
    }

    /// Whether the connection currently has an identified session.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.names.contains_key(&id)
    }

    /// Delete the mapping, returning the removed name. Callers use the
    /// return value to decide whether a departure notice goes out.
    pub fn remove(&self, id: ConnectionId) -> Option<String> {
        self.names.remove(&id).map(|(_, name)| name)
    }
}
