//! Event storage interface.

use async_trait::async_trait;

use crate::event::{Event, EventId};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[cfg(feature = "mongodb")]
    #[error("BSON encode error: {0}")]
    BsonEncode(#[from] mongodb::bson::ser::Error),

    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored event is corrupt: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Interface for event persistence.
///
/// The store is append-only and ordered by `receivedAt`. Events that share a
/// timestamp are ordered by insertion, most recent first.
///
/// Implementations:
/// - `SqliteEventStore`: SQLite storage
/// - `MongoEventStore`: MongoDB storage
/// - `MockEventStore`: In-memory mock for testing
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist an event and return the identifier assigned to it.
    ///
    /// Any `id` already present on `event` is ignored.
    async fn insert(&self, event: &Event) -> Result<EventId>;

    /// The event with the greatest `receivedAt`, or `None` when empty.
    async fn find_latest(&self) -> Result<Option<Event>>;

    /// Up to `limit` events, newest first.
    ///
    /// Returning fewer than `limit` events (including none) is not an error.
    async fn find_recent(&self, limit: usize) -> Result<Vec<Event>>;
}
