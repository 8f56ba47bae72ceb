//! Telemetry event model.
//!
//! An [`Event`] is one parsed, timestamped telemetry record. The payload is
//! whatever the sensor sent; the relay only adds `receivedAt` at ingestion
//! and `id` once the store has accepted the write.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open-ended, insertion-ordered sensor fields.
pub type Payload = Map<String, Value>;

/// Wire name of the store-assigned identifier.
pub const ID_FIELD: &str = "id";
/// Wire name of the ingestion timestamp.
pub const RECEIVED_AT_FIELD: &str = "receivedAt";

/// Fields the relay owns. Senders cannot set them.
const RESERVED_FIELDS: [&str; 2] = [ID_FIELD, RECEIVED_AT_FIELD];

/// Store-assigned event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A telemetry event.
///
/// Serializes as one flat JSON object: `id`, `receivedAt`, then every
/// payload field in the order the sender wrote them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Absent until the event has been persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,
    #[serde(rename = "receivedAt", serialize_with = "serialize_received_at")]
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Event {
    /// Create an event that has not been persisted yet.
    pub fn new(payload: Payload, received_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            received_at,
            payload,
        }
    }

    /// Attach the identifier returned by the store.
    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    /// Fixed-width RFC 3339 rendering of `received_at`.
    ///
    /// Lexicographic order of this string equals chronological order,
    /// which the SQL backend relies on for `ORDER BY`.
    pub fn received_at_rfc3339(&self) -> String {
        format_received_at(&self.received_at)
    }
}

/// Fixed-width, millisecond RFC 3339 in UTC (`2024-01-31T08:00:00.000Z`).
pub fn format_received_at(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_received_at<S>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_received_at(at))
}

/// Errors raised while decoding a raw broker payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Decode a raw broker payload into event fields.
///
/// Only JSON objects are records; scalars and arrays are rejected.
/// Reserved fields (`id`, `receivedAt`) are stripped so the values the
/// relay assigns are authoritative.
pub fn parse_payload(raw: &[u8]) -> Result<Payload, PayloadError> {
    match serde_json::from_slice::<Value>(raw)? {
        Value::Object(fields) => Ok(fields
            .into_iter()
            .filter(|(name, _)| !RESERVED_FIELDS.contains(&name.as_str()))
            .collect()),
        other => Err(PayloadError::NotAnObject(json_kind(&other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truncate a timestamp to the millisecond precision events are kept at.
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

/// Issues `receivedAt` stamps for one ingestion stream.
///
/// Stamps have millisecond precision, rounded up so a stamp is never earlier
/// than the instant it records. They never go backwards: if the wall clock
/// steps back, the last issued stamp is reused until it catches up.
#[derive(Debug, Default)]
pub struct ReceiptClock {
    last_millis: AtomicI64,
}

impl ReceiptClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp for an event received now.
    pub fn now(&self) -> DateTime<Utc> {
        self.stamp(Utc::now())
    }

    /// Stamp for an event received at the given wall-clock time.
    pub fn stamp(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let mut wall_millis = wall.timestamp_millis();
        if wall.timestamp_subsec_nanos() % 1_000_000 != 0 {
            wall_millis += 1;
        }
        let previous = self.last_millis.fetch_max(wall_millis, Ordering::AcqRel);
        let millis = previous.max(wall_millis);
        DateTime::from_timestamp_millis(millis).unwrap_or(wall)
    }
}
