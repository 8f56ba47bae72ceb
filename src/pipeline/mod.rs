//! Event pipeline: the path from a raw broker message to a stored,
//! broadcast event.
//!
//! For each message, in order:
//! 1. Decode the payload as a JSON object
//! 2. Stamp `receivedAt`
//! 3. Insert into the store
//! 4. Broadcast the stored event, id included
//!
//! A failure at step 1 or 3 ends processing of that message only. Broadcast
//! happens strictly after a successful write.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::event::{parse_payload, Event, PayloadError, ReceiptClock};
use crate::interfaces::{EventStore, Fanout, InboundMessage, MessageHandler, StorageError};

/// Why a message did not become a broadcast event.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("store write failed: {0}")]
    StoreWriteFailed(#[from] StorageError),
}

/// Ingests raw broker messages.
pub struct EventPipeline {
    store: Arc<dyn EventStore>,
    fanout: Arc<dyn Fanout>,
    clock: ReceiptClock,
}

impl EventPipeline {
    pub fn new(store: Arc<dyn EventStore>, fanout: Arc<dyn Fanout>) -> Self {
        Self {
            store,
            fanout,
            clock: ReceiptClock::new(),
        }
    }

    /// Process one raw payload.
    ///
    /// Returns the persisted event (with its id) once it has been handed to
    /// the fanout.
    pub async fn handle_inbound_message(&self, raw: &[u8]) -> Result<Event, PipelineError> {
        let payload = parse_payload(raw)?;
        let event = Event::new(payload, self.clock.now());

        let id = self.store.insert(&event).await?;
        let event = event.with_id(id);

        self.fanout.broadcast(&event);
        Ok(event)
    }
}

#[async_trait]
impl MessageHandler for EventPipeline {
    async fn handle(&self, message: InboundMessage) {
        match self.handle_inbound_message(&message.payload).await {
            Ok(event) => {
                info!(
                    topic = %message.topic,
                    id = event.id.as_ref().map(|id| id.as_str()).unwrap_or_default(),
                    received_at = %event.received_at_rfc3339(),
                    "event stored"
                );
            }
            Err(PipelineError::InvalidPayload(e)) => {
                warn!(
                    topic = %message.topic,
                    bytes = message.payload.len(),
                    error = %e,
                    "discarding invalid payload"
                );
            }
            Err(PipelineError::StoreWriteFailed(e)) => {
                error!(
                    topic = %message.topic,
                    error = %e,
                    "store write failed, event not broadcast"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests;
