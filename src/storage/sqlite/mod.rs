//! SQLite implementation of the event store.

mod event_store;

pub use event_store::SqliteEventStore;

/// Path that selects a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";
