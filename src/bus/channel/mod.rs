//! In-process broker for standalone mode.
//!
//! Uses a tokio broadcast channel for pub/sub within a single process.
//! Topic filters follow MQTT wildcard rules so the same configuration works
//! against either broker.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BrokerSubscriber, BusError, InboundMessage, MessageHandler, Result};

/// Default channel capacity for broadcast.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Check if a concrete topic matches an MQTT topic filter.
///
/// Matching rules:
/// - `+` matches exactly one level
/// - `#` (last level only) matches the parent level and everything below it
/// - Topics starting with `$` are not matched by a leading wildcard
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// In-process message broker.
///
/// Cloning shares the same channel.
#[derive(Clone)]
pub struct ChannelBroker {
    sender: broadcast::Sender<InboundMessage>,
}

impl ChannelBroker {
    /// Create a broker that buffers up to `capacity` messages per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a message. Returns how many subscribers were live to see it.
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<Bytes>) -> usize {
        let message = InboundMessage::new(topic, payload);
        self.sender.send(message).unwrap_or(0)
    }

    /// Subscribe with an MQTT-style topic filter.
    ///
    /// Messages published after this call are visible to the subscriber.
    pub fn subscriber(&self, filter: impl Into<String>) -> ChannelSubscriber {
        ChannelSubscriber {
            receiver: self.sender.subscribe(),
            filter: filter.into(),
        }
    }
}

impl Default for ChannelBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Subscription to a [`ChannelBroker`].
pub struct ChannelSubscriber {
    receiver: broadcast::Receiver<InboundMessage>,
    filter: String,
}

#[async_trait]
impl BrokerSubscriber for ChannelSubscriber {
    async fn run(
        mut self: Box<Self>,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!(filter = %self.filter, "channel subscriber started");

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(filter = %self.filter, "channel subscriber stopped");
                    return Ok(());
                }
                received = self.receiver.recv() => received,
            };

            match received {
                Ok(message) => {
                    if !topic_matches(&self.filter, &message.topic) {
                        debug!(topic = %message.topic, "skipping message outside filter");
                        continue;
                    }
                    handler.handle(message).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "channel subscriber lagged, messages lost");
                }
                Err(RecvError::Closed) => return Err(BusError::Closed),
            }
        }
    }
}
