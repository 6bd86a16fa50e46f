//! Per-connection typing debounce timers.
//!
//! One pending one-shot task per connection that is "currently typing".
//! Every new typing event re-arms the timer, so the stop-notification fires
//! only after [`TYPING_DEBOUNCE`] elapses with no further typing event.

use dashmap::DashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::ws::ConnectionId;

/// Quiet period after the last typing event before "stop typing" goes out.
pub const TYPING_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Arena of cancellable debounce tasks keyed by connection identifier.
///
/// A fired timer's finished handle stays in the map until the next `arm` or
/// `disarm` for that connection; aborting a finished task is a no-op, so
/// this does not affect observable behavior.
#[derive(Debug, Default)]
pub struct TypingTimers {
    timers: DashMap<ConnectionId, JoinHandle<()>>,
}

impl TypingTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_fire` to run once after `delay`, cancelling any timer
    /// already pending for this connection. A cancelled callback never runs.
    pub fn arm<F>(&self, id: ConnectionId, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some((_, previous)) = self.timers.remove(&id) {
            previous.abort();
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });
        self.timers.insert(id, handle);
    }

    /// Cancel any pending timer for this connection; no-op if none pending.
    /// Must run on disconnect so no stray callback fires on behalf of a
    /// connection no longer tracked.
    pub fn disarm(&self, id: ConnectionId) {
        if let Some((_, handle)) = self.timers.remove(&id) {
            handle.abort();
        }
    }
}
