//! Broker delivery interface.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Messaging type '{0}' is not available: {1}")]
    Unsupported(String, String),

    #[error("Broker closed")]
    Closed,
}

/// One raw message as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Concrete topic the message was published on.
    pub topic: String,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Handler for processing messages from the broker.
///
/// Failures are the handler's to log and recover from; a subscriber keeps
/// delivering regardless of what happened to the previous message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one message. The subscriber awaits this before reading the
    /// next message, so messages are handled one at a time, in order.
    async fn handle(&self, message: InboundMessage);
}

/// A live subscription to one broker topic.
///
/// Implementations:
/// - `MqttSubscriber`: MQTT broker via rumqttc
/// - `ChannelSubscriber`: In-process broker for standalone use and tests
#[async_trait]
pub trait BrokerSubscriber: Send {
    /// Deliver messages to `handler` until `shutdown` is cancelled or the
    /// broker goes away for good.
    async fn run(
        self: Box<Self>,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<()>;
}
