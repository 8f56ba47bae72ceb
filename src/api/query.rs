//! Read side: latest and recent events straight from the store.

use std::sync::Arc;

use crate::event::Event;
use crate::interfaces::{EventStore, StorageError};

/// Default number of events returned by a recent-events read.
pub const DEFAULT_RECENT_LIMIT: usize = 20;
/// Largest page a caller may request.
pub const MAX_RECENT_LIMIT: usize = 100;

/// Query failures. "No data" is not one of them.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("store read failed: {0}")]
    StoreReadFailed(#[from] StorageError),
}

/// Answers read requests against the store.
pub struct QueryService {
    store: Arc<dyn EventStore>,
    default_limit: usize,
}

impl QueryService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_default_limit(store, DEFAULT_RECENT_LIMIT)
    }

    /// Use `default_limit` when a caller does not ask for a page size.
    pub fn with_default_limit(store: Arc<dyn EventStore>, default_limit: usize) -> Self {
        Self {
            store,
            default_limit: default_limit.clamp(1, MAX_RECENT_LIMIT),
        }
    }

    /// The newest event, or `None` when nothing has been stored yet.
    pub async fn get_latest(&self) -> Result<Option<Event>, QueryError> {
        Ok(self.store.find_latest().await?)
    }

    /// Up to `limit` events, newest first. `None` means the default page.
    pub async fn get_recent(&self, limit: Option<usize>) -> Result<Vec<Event>, QueryError> {
        let limit = limit.unwrap_or(self.default_limit);
        Ok(self.store.find_recent(limit).await?)
    }

    /// Turn a caller-supplied page size into one the service will honor.
    ///
    /// Missing means the default; anything outside `1..=100` is clamped.
    pub fn resolve_limit(&self, requested: Option<i64>) -> usize {
        match requested {
            None => self.default_limit,
            Some(n) if n < 1 => 1,
            Some(n) => usize::try_from(n).unwrap_or(MAX_RECENT_LIMIT).min(MAX_RECENT_LIMIT),
        }
    }
}
