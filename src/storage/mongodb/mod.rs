//! MongoDB implementation of the event store.

mod event_store;

pub use event_store::MongoEventStore;

/// Database used when neither the config nor the URI names one.
pub(crate) const DEFAULT_DATABASE: &str = "telemetry";

/// Document field holding the ingestion timestamp.
pub(crate) const RECEIVED_AT_FIELD: &str = "receivedAt";
