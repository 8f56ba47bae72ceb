//! Mock storage implementation for testing.

mod event_store;

pub use event_store::MockEventStore;
