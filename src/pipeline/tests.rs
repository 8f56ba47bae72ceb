use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;

use super::*;
use crate::interfaces::BroadcastResult;
use crate::storage::MockEventStore;

/// Records broadcasts along with how many inserts the store had seen.
struct RecordingFanout {
    store: Arc<MockEventStore>,
    broadcasts: Mutex<Vec<(Event, u64)>>,
}

impl RecordingFanout {
    fn new(store: Arc<MockEventStore>) -> Self {
        Self {
            store,
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<Event> {
        self.broadcasts.lock().iter().map(|(e, _)| e.clone()).collect()
    }
}

impl Fanout for RecordingFanout {
    fn broadcast(&self, event: &Event) -> BroadcastResult {
        self.broadcasts
            .lock()
            .push((event.clone(), self.store.insert_count()));
        BroadcastResult {
            delivered: 1,
            ..Default::default()
        }
    }
}

fn pipeline() -> (EventPipeline, Arc<MockEventStore>, Arc<RecordingFanout>) {
    let store = Arc::new(MockEventStore::new());
    let fanout = Arc::new(RecordingFanout::new(store.clone()));
    let pipeline = EventPipeline::new(store.clone(), fanout.clone());
    (pipeline, store, fanout)
}

#[tokio::test]
async fn test_valid_payload_writes_then_broadcasts() {
    let (pipeline, store, fanout) = pipeline();
    let started = Utc::now();

    let event = pipeline
        .handle_inbound_message(br#"{"temperature": 25.4, "humidity": 60}"#)
        .await
        .unwrap();

    assert_eq!(store.insert_count(), 1);
    let broadcasts = fanout.broadcasts.lock().clone();
    assert_eq!(broadcasts.len(), 1);

    let (broadcast, inserts_seen) = &broadcasts[0];
    assert_eq!(*inserts_seen, 1, "write must precede broadcast");
    assert_eq!(broadcast, &event);
    assert!(broadcast.id.is_some());
    assert_eq!(broadcast.payload["temperature"], json!(25.4));
    assert_eq!(broadcast.payload["humidity"], json!(60));
    assert!(broadcast.received_at >= started);
}

#[tokio::test]
async fn test_broadcast_event_matches_stored_event() {
    let (pipeline, store, fanout) = pipeline();

    pipeline
        .handle_inbound_message(br#"{"rpm": 900}"#)
        .await
        .unwrap();

    let stored = store.stored().await;
    assert_eq!(stored, fanout.events());
}

#[tokio::test]
async fn test_malformed_payload_is_discarded() {
    let (pipeline, store, fanout) = pipeline();

    let result = pipeline.handle_inbound_message(b"{not json").await;

    assert!(matches!(result, Err(PipelineError::InvalidPayload(_))));
    assert_eq!(store.insert_count(), 0);
    assert!(fanout.events().is_empty());
}

#[tokio::test]
async fn test_non_object_payload_is_discarded() {
    let (pipeline, store, fanout) = pipeline();

    let result = pipeline.handle_inbound_message(b"[1, 2, 3]").await;

    assert!(matches!(result, Err(PipelineError::InvalidPayload(_))));
    assert_eq!(store.insert_count(), 0);
    assert!(fanout.events().is_empty());
}

#[tokio::test]
async fn test_store_failure_skips_broadcast_and_recovers() {
    let (pipeline, store, fanout) = pipeline();
    store.set_fail_on_insert(true).await;

    let result = pipeline.handle_inbound_message(br#"{"v": 1}"#).await;
    assert!(matches!(result, Err(PipelineError::StoreWriteFailed(_))));
    assert!(fanout.events().is_empty());

    store.set_fail_on_insert(false).await;
    let event = pipeline
        .handle_inbound_message(br#"{"v": 2}"#)
        .await
        .unwrap();

    let broadcasts = fanout.events();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0], event);
    assert_eq!(event.payload["v"], json!(2));
}

#[tokio::test]
async fn test_received_at_is_non_decreasing() {
    let (pipeline, _store, fanout) = pipeline();

    for i in 0..20 {
        pipeline
            .handle_inbound_message(format!("{{\"n\": {i}}}").as_bytes())
            .await
            .unwrap();
    }

    let stamps: Vec<_> = fanout.events().iter().map(|e| e.received_at).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_sender_cannot_forge_reserved_fields() {
    let (pipeline, _store, _fanout) = pipeline();

    let event = pipeline
        .handle_inbound_message(br#"{"id": "forged", "receivedAt": "1970-01-01T00:00:00Z", "t": 1}"#)
        .await
        .unwrap();

    assert_ne!(event.id.as_ref().map(|id| id.as_str()), Some("forged"));
    assert!(event.received_at.timestamp() > 0);
    assert_eq!(event.payload.len(), 1);
}

#[tokio::test]
async fn test_message_handler_continues_after_failures() {
    let (pipeline, store, fanout) = pipeline();

    pipeline
        .handle(InboundMessage::new("sensors/a", "garbage"))
        .await;
    pipeline
        .handle(InboundMessage::new("sensors/a", r#"{"ok": true}"#))
        .await;

    assert_eq!(store.insert_count(), 1);
    assert_eq!(fanout.events().len(), 1);
}
