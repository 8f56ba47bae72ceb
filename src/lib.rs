//! telemetry-relay - broker-to-store-to-browser relay
//!
//! Subscribes to sensor readings on a message broker, persists each reading
//! with a receipt timestamp, pushes it to live WebSocket clients, and serves
//! the stored history over a small read API.

pub mod api;
pub mod bus;
pub mod config;
pub mod event;
pub mod fanout;
pub mod interfaces;
pub mod pipeline;
pub mod runtime;
pub mod storage;
pub mod utils;

pub use event::{Event, EventId, Payload};
pub use runtime::{Relay, RelayBuilder, RelayError};
