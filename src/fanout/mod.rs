//! Live fanout to connected WebSocket clients.
//!
//! Each client gets its own bounded `mpsc` queue, so a slow client cannot
//! block or affect the others. Broadcast serializes the frame once and hands
//! it to every queue with `try_send`; it never waits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Utf8Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

use crate::event::Event;
use crate::interfaces::fanout::{BroadcastResult, Fanout};

mod session;

pub use session::run_session;

/// Unique identifier for a connected client.
pub type ClientId = u64;

/// Event name used in frames when none is configured.
pub const DEFAULT_EVENT_NAME: &str = "sensor-data";

/// What to do with a client whose queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlowClientPolicy {
    /// Skip the event for that client only.
    #[default]
    Drop,
    /// Evict the client; its session closes the socket.
    Disconnect,
}

/// Fanout configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Name carried in every frame's `event` field.
    pub event_name: String,
    /// Frames queued per client before the slow-client policy applies.
    pub client_buffer: usize,
    /// Policy for clients whose queue is full.
    pub slow_client_policy: SlowClientPolicy,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            event_name: DEFAULT_EVENT_NAME.to_string(),
            client_buffer: 64,
            slow_client_policy: SlowClientPolicy::Drop,
        }
    }
}

/// One live push: `{"event": "<name>", "data": <Event>}`.
#[derive(Serialize)]
struct Frame<'a> {
    event: &'a str,
    data: &'a Event,
}

struct ClientHandle {
    tx: mpsc::Sender<Utf8Bytes>,
    dropped: AtomicU64,
}

/// Registry of connected clients.
pub struct LiveFanout {
    clients: RwLock<HashMap<ClientId, ClientHandle>>,
    event_name: String,
    buffer: usize,
    policy: SlowClientPolicy,
    next_id: AtomicU64,
}

impl LiveFanout {
    pub fn new(config: &FanoutConfig) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            event_name: config.event_name.clone(),
            buffer: config.client_buffer.max(1),
            policy: config.slow_client_policy,
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a client. Frames broadcast from now on arrive on the receiver.
    pub fn add_client(&self) -> (ClientId, mpsc::Receiver<Utf8Bytes>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);

        self.clients.write().insert(
            id,
            ClientHandle {
                tx,
                dropped: AtomicU64::new(0),
            },
        );
        debug!(client_id = id, "client registered");
        (id, rx)
    }

    /// Remove a client, returning whether it was still registered.
    pub fn remove_client(&self, id: ClientId) -> bool {
        let removed = self.clients.write().remove(&id);
        if let Some(handle) = &removed {
            debug!(
                client_id = id,
                dropped = handle.dropped.load(Ordering::Relaxed),
                "client removed"
            );
        }
        removed.is_some()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Render the frame pushed to clients for `event`.
    pub fn encode_frame(&self, event: &Event) -> serde_json::Result<String> {
        serde_json::to_string(&Frame {
            event: &self.event_name,
            data: event,
        })
    }
}

impl Fanout for LiveFanout {
    fn broadcast(&self, event: &Event) -> BroadcastResult {
        let frame = match self.encode_frame(event) {
            Ok(frame) => Utf8Bytes::from(frame),
            Err(e) => {
                error!(error = %e, "failed to encode live frame");
                return BroadcastResult::default();
            }
        };

        let mut result = BroadcastResult::default();
        let mut evicted: Vec<ClientId> = Vec::new();

        let clients = self.clients.read();
        for (&id, client) in clients.iter() {
            match client.tx.try_send(frame.clone()) {
                Ok(()) => result.delivered += 1,
                Err(TrySendError::Full(_)) => match self.policy {
                    SlowClientPolicy::Drop => {
                        let total = client.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!(client_id = id, dropped = total, "client lagging, event skipped");
                        result.dropped += 1;
                    }
                    SlowClientPolicy::Disconnect => {
                        warn!(client_id = id, "client lagging, disconnecting");
                        evicted.push(id);
                    }
                },
                Err(TrySendError::Closed(_)) => evicted.push(id),
            }
        }
        drop(clients);

        // Prune outside the read lock.
        if !evicted.is_empty() {
            let mut clients = self.clients.write();
            for id in &evicted {
                clients.remove(id);
            }
        }
        result.evicted = evicted.len();

        result
    }
}

impl std::fmt::Debug for LiveFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFanout")
            .field("clients", &self.client_count())
            .field("event_name", &self.event_name)
            .field("buffer", &self.buffer)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
