//! MongoDB EventStore implementation.
//!
//! Events are stored as flat documents: payload fields at the top level,
//! `receivedAt` as a BSON date, and `_id` as the driver-assigned ObjectId.
//! This keeps the collection readable by other tools that query it directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::FindOptions;
use mongodb::{Client, Collection, IndexModel};
use tracing::debug;

use super::{DEFAULT_DATABASE, RECEIVED_AT_FIELD};
use crate::event::{Event, EventId, Payload};
use crate::interfaces::event_store::{EventStore, Result, StorageError};

const ID_FIELD: &str = "_id";

/// MongoDB implementation of EventStore.
pub struct MongoEventStore {
    events: Collection<Document>,
}

impl MongoEventStore {
    /// Create a store on `collection`, creating its index.
    ///
    /// `database` falls back to the database named in the connection URI,
    /// then to `telemetry`.
    pub async fn new(client: &Client, database: Option<&str>, collection: &str) -> Result<Self> {
        let database = match database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
        };
        let events = database.collection(collection);

        let store = Self { events };
        store.init().await?;

        debug!(
            database = %database.name(),
            collection = %collection,
            "mongodb store ready"
        );
        Ok(store)
    }

    /// Connect with a URI and create the store.
    pub async fn connect(uri: &str, database: Option<&str>, collection: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Self::new(&client, database, collection).await
    }

    async fn init(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { RECEIVED_AT_FIELD: -1 })
            .build();

        self.events.create_index(index).await?;

        Ok(())
    }

    async fn find_newest(&self, limit: i64) -> Result<Vec<Event>> {
        let options = FindOptions::builder()
            .sort(doc! { RECEIVED_AT_FIELD: -1, ID_FIELD: -1 })
            .limit(limit)
            .build();

        let mut cursor = self.events.find(doc! {}).with_options(options).await?;

        let mut events = Vec::new();
        while cursor.advance().await? {
            let document = cursor.deserialize_current()?;
            events.push(decode_document(document)?);
        }

        Ok(events)
    }
}

fn encode_document(event: &Event) -> Result<Document> {
    let mut document = bson::to_document(&event.payload)?;
    document.remove(ID_FIELD);
    document.insert(
        RECEIVED_AT_FIELD,
        bson::DateTime::from_millis(event.received_at.timestamp_millis()),
    );
    Ok(document)
}

fn decode_document(mut document: Document) -> Result<Event> {
    let id = match document.remove(ID_FIELD) {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) => s,
        Some(other) => other.to_string(),
        None => return Err(StorageError::Corrupt("document without _id".to_string())),
    };

    let received_at = match document.remove(RECEIVED_AT_FIELD) {
        Some(Bson::DateTime(at)) => DateTime::from_timestamp_millis(at.timestamp_millis()),
        Some(Bson::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|at| at.with_timezone(&Utc)),
        _ => None,
    }
    .ok_or_else(|| StorageError::Corrupt(format!("event {}: missing or bad receivedAt", id)))?;

    let payload: Payload = match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(fields) => fields,
        _ => Payload::new(),
    };

    Ok(Event::new(payload, received_at).with_id(EventId::new(id)))
}

#[async_trait]
impl EventStore for MongoEventStore {
    async fn insert(&self, event: &Event) -> Result<EventId> {
        let document = encode_document(event)?;
        let inserted = self.events.insert_one(document).await?;

        let id = match inserted.inserted_id {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => other.to_string(),
        };
        Ok(EventId::new(id))
    }

    async fn find_latest(&self) -> Result<Option<Event>> {
        Ok(self.find_newest(1).await?.into_iter().next())
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<Event>> {
        // A zero limit means "no limit" to MongoDB.
        if limit == 0 {
            return Ok(vec![]);
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.find_newest(limit).await
    }
}
