//! Broker subscription.
//!
//! This module contains:
//! - Messaging configuration types
//! - `init_subscriber`: builds the configured subscriber
//! - Implementations: MQTT, in-process channel broker

use serde::Deserialize;
use tracing::info;

pub use crate::interfaces::message_handler::{
    BrokerSubscriber, BusError, InboundMessage, MessageHandler, Result,
};

#[cfg(feature = "channel")]
pub mod channel;
#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "channel")]
pub use channel::{topic_matches, ChannelBroker, ChannelSubscriber};
#[cfg(feature = "mqtt")]
pub use mqtt::MqttSubscriber;

// ============================================================================
// Configuration
// ============================================================================

/// Messaging type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagingType {
    /// External MQTT broker.
    #[default]
    Mqtt,
    /// In-process broker, supplied programmatically.
    Channel,
}

impl std::fmt::Display for MessagingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessagingType::Mqtt => write!(f, "mqtt"),
            MessagingType::Channel => write!(f, "channel"),
        }
    }
}

/// Messaging configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Messaging type discriminator.
    #[serde(rename = "type")]
    pub messaging_type: MessagingType,
    /// MQTT-specific configuration.
    pub mqtt: MqttConfig,
}

/// MQTT-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Topic filter to subscribe to. Wildcards are allowed.
    pub topic: String,
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// Optional username.
    pub username: Option<String>,
    /// Optional password (used only with `username`).
    pub password: Option<String>,
    /// Subscription QoS (0, 1 or 2).
    pub qos: u8,
    /// Capacity of the client request channel.
    pub channel_capacity: usize,
    /// How long startup waits for the first ConnAck.
    pub connect_timeout_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: String::new(),
            client_id: format!("telemetry-relay-{}", std::process::id()),
            keep_alive_secs: 30,
            username: None,
            password: None,
            qos: 1,
            channel_capacity: 64,
            connect_timeout_secs: 10,
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Build the subscriber named by `config`.
///
/// For MQTT this connects and subscribes before returning, so an unreachable
/// broker fails startup. The channel broker has no external endpoint; callers
/// create a [`ChannelBroker`] and hand its subscriber to the relay directly.
pub async fn init_subscriber(config: &MessagingConfig) -> Result<Box<dyn BrokerSubscriber>> {
    info!(messaging = %config.messaging_type, "initializing subscriber");

    match config.messaging_type {
        #[cfg(feature = "mqtt")]
        MessagingType::Mqtt => {
            let subscriber = MqttSubscriber::connect(&config.mqtt).await?;
            Ok(Box::new(subscriber))
        }
        #[cfg(not(feature = "mqtt"))]
        MessagingType::Mqtt => Err(BusError::Unsupported(
            "mqtt".to_string(),
            "the 'mqtt' feature is not enabled".to_string(),
        )),
        MessagingType::Channel => Err(BusError::Unsupported(
            "channel".to_string(),
            "an in-process broker must be supplied programmatically".to_string(),
        )),
    }
}
