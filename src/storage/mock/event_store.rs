//! Mock EventStore implementation for testing.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::event::{Event, EventId};
use crate::interfaces::event_store::{EventStore, Result, StorageError};

/// Mock event store that keeps events in memory.
///
/// Reads and writes can be made to fail independently, which is how tests
/// simulate a store outage and its recovery.
#[derive(Default)]
pub struct MockEventStore {
    events: RwLock<Vec<Event>>,
    fail_on_insert: RwLock<bool>,
    fail_on_read: RwLock<bool>,
    inserts: AtomicU64,
}

impl MockEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_insert(&self, fail: bool) {
        *self.fail_on_insert.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Number of successful inserts.
    pub fn insert_count(&self) -> u64 {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Snapshot of everything stored, in insertion order.
    pub async fn stored(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("mock store read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MockEventStore {
    async fn insert(&self, event: &Event) -> Result<EventId> {
        if *self.fail_on_insert.read().await {
            return Err(StorageError::Unavailable("mock store write failure".to_string()));
        }

        let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        let id = EventId::new(format!("mock-{}", n));
        let stored = event.clone().with_id(id.clone());
        self.events.write().await.push(stored);
        Ok(id)
    }

    async fn find_latest(&self) -> Result<Option<Event>> {
        Ok(self.find_recent(1).await?.into_iter().next())
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<Event>> {
        self.check_read().await?;

        let store = self.events.read().await;
        // Newest insertion first; the stable sort keeps that order for ties.
        let mut events: Vec<Event> = store.iter().rev().cloned().collect();
        events.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        events.truncate(limit);
        Ok(events)
    }
}
