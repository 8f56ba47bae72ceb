//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod server;

pub use server::ServerConfig;

use serde::Deserialize;

use crate::api::MAX_RECENT_LIMIT;
use crate::bus::{MessagingConfig, MessagingType};
use crate::fanout::FanoutConfig;
use crate::storage::{StorageConfig, StorageType};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "TELEMETRY_RELAY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "TELEMETRY_RELAY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "TELEMETRY_RELAY_LOG";
/// Environment variable selecting the log format (`json` or text).
pub const LOG_FORMAT_ENV_VAR: &str = "TELEMETRY_RELAY_LOG_FORMAT";

/// Legacy variable holding a MongoDB connection string.
pub const MONGO_URI_ENV_VAR: &str = "MONGO_URI";
/// Legacy variable holding the listen port.
pub const PORT_ENV_VAR: &str = "PORT";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Broker configuration.
    pub messaging: MessagingConfig,
    /// Live fanout configuration.
    pub fanout: FanoutConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix and `__`
    ///    separator, e.g. `TELEMETRY_RELAY__MESSAGING__MQTT__TOPIC`
    /// 5. Legacy `MONGO_URI` (selects MongoDB storage) and `PORT`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        if let Ok(uri) = std::env::var(MONGO_URI_ENV_VAR) {
            builder = builder
                .set_override("storage.type", "mongodb")?
                .set_override("storage.uri", uri)?;
        }
        if let Ok(port) = std::env::var(PORT_ENV_VAR) {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} is not a port: {}", PORT_ENV_VAR, port)))?;
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.messaging.messaging_type == MessagingType::Mqtt {
            let mqtt = &self.messaging.mqtt;
            if mqtt.topic.trim().is_empty() {
                return Err(ConfigError::Invalid("messaging.mqtt.topic is required".into()));
            }
            if mqtt.host.trim().is_empty() {
                return Err(ConfigError::Invalid("messaging.mqtt.host is required".into()));
            }
            if mqtt.qos > 2 {
                return Err(ConfigError::Invalid(format!(
                    "messaging.mqtt.qos must be 0, 1 or 2, got {}",
                    mqtt.qos
                )));
            }
        }

        if self.storage.uri.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.uri is required".into()));
        }
        if self.storage.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.collection is required".into()));
        }
        if self.storage.storage_type == StorageType::Sqlite
            && !self
                .storage
                .collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "storage.collection '{}' is not a valid table name",
                self.storage.collection
            )));
        }

        if self.fanout.client_buffer == 0 {
            return Err(ConfigError::Invalid("fanout.client_buffer must be at least 1".into()));
        }
        if self.fanout.event_name.is_empty() {
            return Err(ConfigError::Invalid("fanout.event_name is required".into()));
        }

        if !(1..=MAX_RECENT_LIMIT).contains(&self.server.recent_limit) {
            return Err(ConfigError::Invalid(format!(
                "server.recent_limit must be between 1 and {}",
                MAX_RECENT_LIMIT
            )));
        }

        Ok(())
    }

    /// Create config for testing: in-memory SQLite, channel messaging,
    /// ephemeral port on localhost.
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.storage.uri = ":memory:".to_string();
        config.messaging.messaging_type = MessagingType::Channel;
        config
    }
}
