//! SQLite EventStore implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Alias, ColumnDef, Index, Order, Query, SqliteQueryBuilder, Table};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::MEMORY_PATH;
use crate::event::{Event, EventId, Payload};
use crate::interfaces::event_store::{EventStore, Result, StorageError};
use crate::storage::schema::Events;

/// SQLite implementation of EventStore.
///
/// One row per event. `seq` is an autoincrement key that records insertion
/// order for events sharing a timestamp.
pub struct SqliteEventStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteEventStore {
    /// Create a store over an existing pool. Call [`init`](Self::init) before use.
    pub fn new(pool: SqlitePool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
        }
    }

    /// Open the database at `path` and create the schema.
    ///
    /// `:memory:` gives a private database held by a single pooled
    /// connection, which is what tests use.
    pub async fn connect(path: &str, table: &str) -> Result<Self> {
        let in_memory = path == MEMORY_PATH;

        let pool = if in_memory {
            let opts = SqliteConnectOptions::new()
                .filename(MEMORY_PATH)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(opts)
                .await?
        } else {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StorageError::Unavailable(format!(
                            "cannot create directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
            let opts = SqliteConnectOptions::new()
                .filename(path)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(30))
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(opts)
                .await?
        };

        let store = Self::new(pool, table);
        store.init().await?;
        Ok(store)
    }

    fn table(&self) -> Alias {
        Alias::new(&self.table)
    }

    /// Create the events table and its time index if they do not exist.
    pub async fn init(&self) -> Result<()> {
        let create_table = Table::create()
            .table(self.table())
            .if_not_exists()
            .col(
                ColumnDef::new(Events::Seq)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Events::Id).text().not_null().unique_key())
            .col(ColumnDef::new(Events::ReceivedAt).text().not_null())
            .col(ColumnDef::new(Events::Payload).text().not_null())
            .to_string(SqliteQueryBuilder);

        sqlx::query(&create_table).execute(&self.pool).await?;

        let create_index = Index::create()
            .if_not_exists()
            .name(format!("idx_{}_received_at", self.table))
            .table(self.table())
            .col(Events::ReceivedAt)
            .to_string(SqliteQueryBuilder);

        sqlx::query(&create_index).execute(&self.pool).await?;

        debug!(table = %self.table, "sqlite schema ready");
        Ok(())
    }

    async fn select_newest(&self, limit: u64) -> Result<Vec<Event>> {
        let query = Query::select()
            .columns([Events::Id, Events::ReceivedAt, Events::Payload])
            .from(self.table())
            .order_by(Events::ReceivedAt, Order::Desc)
            .order_by(Events::Seq, Order::Desc)
            .limit(limit)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(decode_row(&row)?);
        }

        Ok(events)
    }
}

fn decode_row(row: &SqliteRow) -> Result<Event> {
    let id: String = row.try_get("id")?;
    let received_at: String = row.try_get("received_at")?;
    let payload: String = row.try_get("payload")?;

    let received_at = DateTime::parse_from_rfc3339(&received_at)
        .map_err(|e| StorageError::Corrupt(format!("event {}: bad received_at: {}", id, e)))?
        .with_timezone(&Utc);
    let payload: Payload = serde_json::from_str(&payload)?;

    Ok(Event::new(payload, received_at).with_id(EventId::new(id)))
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert(&self, event: &Event) -> Result<EventId> {
        let id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&event.payload)?;

        let query = Query::insert()
            .into_table(self.table())
            .columns([Events::Id, Events::ReceivedAt, Events::Payload])
            .values_panic([
                id.clone().into(),
                event.received_at_rfc3339().into(),
                payload.into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;

        Ok(EventId::new(id))
    }

    async fn find_latest(&self) -> Result<Option<Event>> {
        Ok(self.select_newest(1).await?.into_iter().next())
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<Event>> {
        if limit == 0 {
            return Ok(vec![]);
        }
        self.select_newest(limit as u64).await
    }
}
