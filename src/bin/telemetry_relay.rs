//! telemetry-relay: broker subscriber, event store, live push and read API
//! in one process.
//!
//! ## Configuration
//! ```yaml
//! server:
//!   port: 3000
//!   static_dir: ./public
//!
//! storage:
//!   type: mongodb
//!   uri: mongodb://localhost:27017
//!   database: telemetry
//!   collection: sensor_readings
//!
//! messaging:
//!   type: mqtt
//!   mqtt:
//!     host: localhost
//!     port: 1883
//!     topic: sensors/#
//! ```
//!
//! A `.env` file in the working directory is loaded first. `MONGO_URI` and
//! `PORT` are honored for older deployments.

use tracing::{error, info};

use telemetry_relay::config::Config;
use telemetry_relay::utils::bootstrap::{init_tracing, parse_config_path, shutdown_signal};
use telemetry_relay::RelayBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Missing .env is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config_path = parse_config_path(std::env::args());
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!(error = %e, "failed to load configuration");
        e
    })?;

    let relay = RelayBuilder::new(config).build().await.map_err(|e| {
        error!(error = %e, "startup failed");
        e
    })?;

    info!(addr = %relay.local_addr(), "telemetry-relay started");

    let shutdown = relay.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutting down");
        shutdown.cancel();
    });

    relay.run().await.map_err(|e| {
        error!(error = %e, "relay stopped with error");
        e
    })?;

    Ok(())
}
