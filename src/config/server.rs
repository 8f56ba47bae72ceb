//! Server and networking configuration types.

use std::path::PathBuf;

use serde::Deserialize;

use crate::api::DEFAULT_RECENT_LIMIT;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port for the HTTP API and live endpoint. 0 picks an ephemeral port.
    pub port: u16,
    /// Directory served at `/` (dashboard page), if any.
    pub static_dir: Option<PathBuf>,
    /// Events returned by `/api/recent` when no limit is given.
    pub recent_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: None,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
