//! MQTT broker subscriber.
//!
//! Holds one subscription on one topic filter. The rumqttc event loop
//! reconnects on its next poll after a connection error; this module paces
//! those attempts with exponential backoff and re-subscribes on every
//! ConnAck, since a clean session forgets subscriptions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::BackoffBuilder;
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{BrokerSubscriber, BusError, InboundMessage, MessageHandler, MqttConfig, Result};
use crate::utils::retry::{reconnect_backoff, MAX_RECONNECT_DELAY};

/// Shortest keep-alive rumqttc accepts.
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Map a numeric QoS level onto rumqttc's enum.
pub fn qos_level(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(BusError::Subscribe(format!(
            "invalid QoS level {}, expected 0, 1 or 2",
            other
        ))),
    }
}

/// Build client options from configuration.
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs).max(MIN_KEEP_ALIVE));
    options.set_clean_session(true);
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }
    options
}

/// Subscriber backed by an MQTT broker.
pub struct MqttSubscriber {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    qos: QoS,
}

impl MqttSubscriber {
    /// Connect to the broker and subscribe to the configured topic.
    ///
    /// Fails if no ConnAck arrives within `connect_timeout_secs`; an
    /// unreachable broker at launch is a startup failure.
    pub async fn connect(config: &MqttConfig) -> Result<Self> {
        let qos = qos_level(config.qos)?;
        let (client, mut eventloop) =
            AsyncClient::new(mqtt_options(config), config.channel_capacity.max(1));

        let endpoint = format!("{}:{}", config.host, config.port);
        let timeout = Duration::from_secs(config.connect_timeout_secs);

        match tokio::time::timeout(timeout, wait_for_connack(&mut eventloop)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(endpoint = %endpoint, error = %e, "MQTT connection failed");
                return Err(BusError::Connection(format!("{}: {}", endpoint, e)));
            }
            Err(_) => {
                error!(endpoint = %endpoint, timeout_secs = config.connect_timeout_secs, "MQTT connection timed out");
                return Err(BusError::Connection(format!(
                    "{}: no ConnAck within {}s",
                    endpoint, config.connect_timeout_secs
                )));
            }
        }

        client
            .subscribe(&config.topic, qos)
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;

        info!(
            endpoint = %endpoint,
            topic = %config.topic,
            client_id = %config.client_id,
            "MQTT connected"
        );

        Ok(Self {
            client,
            eventloop,
            topic: config.topic.clone(),
            qos,
        })
    }

    fn resubscribe(&self) {
        match self.client.try_subscribe(&self.topic, self.qos) {
            Ok(()) => info!(topic = %self.topic, "MQTT reconnected, resubscribing"),
            Err(e) => error!(topic = %self.topic, error = %e, "MQTT resubscribe failed"),
        }
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> std::result::Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

#[async_trait]
impl BrokerSubscriber for MqttSubscriber {
    async fn run(
        mut self: Box<Self>,
        handler: Arc<dyn MessageHandler>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let backoff_builder = reconnect_backoff();
        let mut backoff = backoff_builder.build();

        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => {
                    if let Err(e) = self.client.try_disconnect() {
                        debug!(error = %e, "MQTT disconnect request not sent");
                    }
                    info!(topic = %self.topic, "MQTT subscriber stopped");
                    return Ok(());
                }
                polled = self.eventloop.poll() => polled,
            };

            match polled {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    // The event loop is not polled while the handler runs, so a
                    // handler slower than keep-alive delays PINGREQ and the broker
                    // may drop the session; the reconnect branch below recovers.
                    let message = InboundMessage::new(publish.topic, publish.payload);
                    handler.handle(message).await;
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    backoff = backoff_builder.build();
                    self.resubscribe();
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        error!(topic = %self.topic, "MQTT broker rejected subscription");
                    } else {
                        debug!(topic = %self.topic, "MQTT subscription acknowledged");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let delay = backoff.next().unwrap_or(MAX_RECONNECT_DELAY);
                    warn!(
                        error = %e,
                        backoff_ms = %delay.as_millis(),
                        topic = %self.topic,
                        "MQTT connection lost, reconnecting after backoff"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            info!(topic = %self.topic, "MQTT subscriber stopped");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_level_mapping() {
        assert_eq!(qos_level(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_level(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_level(2).unwrap(), QoS::ExactlyOnce);
        assert!(qos_level(3).is_err());
    }

    #[test]
    fn test_mqtt_options_from_config() {
        let config = MqttConfig {
            host: "broker.local".to_string(),
            port: 8883,
            client_id: "relay-1".to_string(),
            keep_alive_secs: 60,
            ..Default::default()
        };
        let options = mqtt_options(&config);
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 8883));
        assert_eq!(options.client_id(), "relay-1");
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert!(options.clean_session());
    }

    #[test]
    fn test_mqtt_options_clamps_keep_alive() {
        let config = MqttConfig {
            keep_alive_secs: 0,
            ..Default::default()
        };
        assert_eq!(mqtt_options(&config).keep_alive(), MIN_KEEP_ALIVE);
    }

    #[test]
    fn test_mqtt_options_credentials() {
        let config = MqttConfig {
            username: Some("relay".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let options = mqtt_options(&config);
        assert_eq!(
            options.credentials(),
            Some(("relay".to_string(), "secret".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_fails_when_broker_unreachable() {
        // Nothing listens on port 1 on localhost.
        let config = MqttConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            topic: "sensors/#".to_string(),
            connect_timeout_secs: 2,
            ..Default::default()
        };
        assert!(matches!(
            MqttSubscriber::connect(&config).await,
            Err(BusError::Connection(_))
        ));
    }
}
