//! EventStore interface tests.
//!
//! These tests verify the contract of the EventStore trait.
//! Each storage implementation should run these tests against an empty store.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;

use telemetry_relay::event::{truncate_to_millis, Event, Payload};
use telemetry_relay::storage::EventStore;

/// Millisecond-precision base time shared by a test's events.
pub fn base_time() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

/// Create a test event with a reading number `n`.
pub fn make_event(n: i64, received_at: DateTime<Utc>) -> Event {
    let mut payload = Payload::new();
    payload.insert("n".into(), json!(n));
    payload.insert("temperature".into(), json!(20.5));
    Event::new(payload, received_at)
}

fn readings(events: &[Event]) -> Vec<i64> {
    events
        .iter()
        .map(|e| e.payload["n"].as_i64().expect("n should be an integer"))
        .collect()
}

// =============================================================================
// Empty store
// =============================================================================

pub async fn test_find_latest_empty<S: EventStore>(store: &S) {
    let latest = store.find_latest().await.expect("find_latest should succeed");
    assert!(latest.is_none(), "empty store should have no latest event");
}

pub async fn test_find_recent_empty<S: EventStore>(store: &S) {
    let recent = store
        .find_recent(20)
        .await
        .expect("find_recent should succeed");
    assert!(recent.is_empty(), "empty store should return no events");
}

// =============================================================================
// EventStore::insert tests
// =============================================================================

pub async fn test_insert_assigns_unique_ids<S: EventStore>(store: &S) {
    let base = base_time();
    let mut ids = HashSet::new();
    for n in 0..5 {
        let id = store
            .insert(&make_event(n, base + TimeDelta::milliseconds(n)))
            .await
            .expect("insert should succeed");
        assert!(!id.as_str().is_empty(), "id should not be empty");
        ids.insert(id);
    }
    assert_eq!(ids.len(), 5, "ids should be unique");
}

pub async fn test_insert_round_trips_payload<S: EventStore>(store: &S) {
    let received_at = base_time();
    let mut payload = Payload::new();
    payload.insert("temperature".into(), json!(25.4));
    payload.insert("humidity".into(), json!(60));
    payload.insert("label".into(), json!("greenhouse"));
    payload.insert("online".into(), json!(true));
    payload.insert("fault".into(), json!(null));
    payload.insert("samples".into(), json!([1, 2, 3]));
    payload.insert("location".into(), json!({"lat": 52.1, "lon": 4.3}));

    let id = store
        .insert(&Event::new(payload.clone(), received_at))
        .await
        .expect("insert should succeed");

    let latest = store
        .find_latest()
        .await
        .expect("find_latest should succeed")
        .expect("store should have an event");

    assert_eq!(latest.id.as_ref(), Some(&id), "id should match insert result");
    assert_eq!(latest.received_at, received_at, "receivedAt should round-trip");
    assert_eq!(latest.payload, payload, "payload should round-trip");
}

// =============================================================================
// EventStore::find_latest tests
// =============================================================================

pub async fn test_find_latest_orders_by_received_at<S: EventStore>(store: &S) {
    let base = base_time();
    // Inserted out of time order.
    for (n, offset) in [(1, 10), (2, 30), (3, 20)] {
        store
            .insert(&make_event(n, base + TimeDelta::milliseconds(offset)))
            .await
            .expect("insert should succeed");
    }

    let latest = store
        .find_latest()
        .await
        .expect("find_latest should succeed")
        .expect("store should have an event");
    assert_eq!(latest.payload["n"], json!(2));
}

pub async fn test_find_latest_tie_goes_to_last_insert<S: EventStore>(store: &S) {
    let at = base_time();
    for n in 0..3 {
        store
            .insert(&make_event(n, at))
            .await
            .expect("insert should succeed");
    }

    let latest = store
        .find_latest()
        .await
        .expect("find_latest should succeed")
        .expect("store should have an event");
    assert_eq!(latest.payload["n"], json!(2));
}

// =============================================================================
// EventStore::find_recent tests
// =============================================================================

pub async fn test_find_recent_newest_first_with_limit<S: EventStore>(store: &S) {
    let base = base_time();
    for n in 0..25 {
        store
            .insert(&make_event(n, base + TimeDelta::milliseconds(n)))
            .await
            .expect("insert should succeed");
    }

    let recent = store
        .find_recent(20)
        .await
        .expect("find_recent should succeed");
    assert_eq!(readings(&recent), (5..25).rev().collect::<Vec<_>>());
    assert!(
        recent.windows(2).all(|w| w[0].received_at >= w[1].received_at),
        "receivedAt should be non-increasing"
    );
    assert!(recent.iter().all(|e| e.id.is_some()), "every event has an id");
}

pub async fn test_find_recent_fewer_than_limit<S: EventStore>(store: &S) {
    let base = base_time();
    for n in 0..3 {
        store
            .insert(&make_event(n, base + TimeDelta::milliseconds(n)))
            .await
            .expect("insert should succeed");
    }

    let recent = store
        .find_recent(20)
        .await
        .expect("find_recent should succeed");
    assert_eq!(readings(&recent), vec![2, 1, 0]);
}

pub async fn test_find_recent_zero_limit<S: EventStore>(store: &S) {
    store
        .insert(&make_event(0, base_time()))
        .await
        .expect("insert should succeed");

    let recent = store
        .find_recent(0)
        .await
        .expect("find_recent should succeed");
    assert!(recent.is_empty(), "limit 0 should return nothing");
}

/// Run all EventStore tests. `$store` is evaluated once per test and must
/// yield a reference to a fresh, empty store.
#[macro_export]
macro_rules! run_event_store_tests {
    ($store:expr) => {
        use $crate::storage::event_store_tests::*;

        test_find_latest_empty($store).await;
        println!("  test_find_latest_empty: PASSED");

        test_find_recent_empty($store).await;
        println!("  test_find_recent_empty: PASSED");

        // insert tests
        test_insert_assigns_unique_ids($store).await;
        println!("  test_insert_assigns_unique_ids: PASSED");

        test_insert_round_trips_payload($store).await;
        println!("  test_insert_round_trips_payload: PASSED");

        // find_latest tests
        test_find_latest_orders_by_received_at($store).await;
        println!("  test_find_latest_orders_by_received_at: PASSED");

        test_find_latest_tie_goes_to_last_insert($store).await;
        println!("  test_find_latest_tie_goes_to_last_insert: PASSED");

        // find_recent tests
        test_find_recent_newest_first_with_limit($store).await;
        println!("  test_find_recent_newest_first_with_limit: PASSED");

        test_find_recent_fewer_than_limit($store).await;
        println!("  test_find_recent_fewer_than_limit: PASSED");

        test_find_recent_zero_limit($store).await;
        println!("  test_find_recent_zero_limit: PASSED");
    };
}
