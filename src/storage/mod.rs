//! Storage implementations.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

pub use crate::interfaces::event_store::{EventStore, Result, StorageError};

pub mod mock;

#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use mock::MockEventStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEventStore;

#[cfg(feature = "mongodb")]
pub use mongodb::MongoEventStore;

/// Default collection (table) name.
pub const DEFAULT_COLLECTION: &str = "sensor_readings";

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Sqlite,
    Mongodb,
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Sqlite => write!(f, "sqlite"),
            StorageType::Mongodb => write!(f, "mongodb"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// SQLite file path (`:memory:` allowed) or MongoDB connection URI.
    pub uri: String,
    /// MongoDB database name. Falls back to the database in the URI.
    pub database: Option<String>,
    /// Collection (MongoDB) or table (SQLite) holding events.
    pub collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            uri: "./data/telemetry.db".to_string(),
            database: None,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

/// Initialize storage based on configuration.
///
/// Opens the backend and creates its schema or indexes. Failure here is a
/// startup failure.
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn EventStore>> {
    info!(
        storage = %config.storage_type,
        collection = %config.collection,
        "initializing storage"
    );

    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            let store = SqliteEventStore::connect(&config.uri, &config.collection).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err(StorageError::Unavailable(
                "sqlite feature not enabled".to_string(),
            ))
        }
        #[cfg(feature = "mongodb")]
        StorageType::Mongodb => {
            let store = MongoEventStore::connect(
                &config.uri,
                config.database.as_deref(),
                &config.collection,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongodb"))]
        StorageType::Mongodb => {
            tracing::error!("MongoDB storage requested but 'mongodb' feature is not enabled");
            Err(StorageError::Unavailable(
                "mongodb feature not enabled".to_string(),
            ))
        }
    }
}
