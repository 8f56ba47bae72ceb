//! Live fanout interface.

use crate::event::Event;

/// Outcome of one broadcast across all connected clients.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Clients whose queue accepted the event.
    pub delivered: usize,
    /// Lagging clients that skipped this event.
    pub dropped: usize,
    /// Clients removed during this broadcast (closed or evicted).
    pub evicted: usize,
}

/// Real-time distribution of accepted events.
///
/// `broadcast` must not wait on any client: it hands the event off and
/// returns. Clients that connect later never see earlier events.
///
/// Implementations:
/// - `LiveFanout`: WebSocket client registry
pub trait Fanout: Send + Sync {
    /// Send `event` to every client connected at the time of the call.
    fn broadcast(&self, event: &Event) -> BroadcastResult;
}
