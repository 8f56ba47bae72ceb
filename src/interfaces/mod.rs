//! Abstract interfaces for telemetry-relay components.
//!
//! These traits define the contracts for:
//! - Event storage (persistence, recency queries)
//! - Live fanout (real-time push to connected clients)
//! - Broker subscription (raw message delivery)

pub mod event_store;
pub mod fanout;
pub mod message_handler;

pub use event_store::{EventStore, StorageError};
pub use fanout::{BroadcastResult, Fanout};
pub use message_handler::{BrokerSubscriber, BusError, InboundMessage, MessageHandler};
