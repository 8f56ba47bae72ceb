//! Mock storage contract tests.
//!
//! The mock stands in for real stores in unit and end-to-end tests, so it
//! must honor the same contract.

mod storage;

use telemetry_relay::storage::MockEventStore;

#[tokio::test]
async fn test_mock_event_store() {
    println!("=== Mock EventStore Tests ===");

    run_event_store_tests!(&MockEventStore::new());

    println!("=== All Mock EventStore tests PASSED ===");
}
