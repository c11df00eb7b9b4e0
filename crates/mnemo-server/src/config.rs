//! Server configuration.

use std::time::Duration;

use mnemo_hub::HubConfig;
use secrecy::SecretString;

/// Configuration for the mnemo server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind (default `"0.0.0.0:8080"`, port `0` auto-assigns).
    pub listen_address: String,
    /// Keepalive, frame-size and delivery settings for the hub.
    pub hub: HubConfig,
    /// Shared secret that grants the professor role. `None` makes every
    /// client a student.
    pub professor_api_key: Option<SecretString>,
    /// Reported by `GET /version`.
    pub version: String,
    /// How long graceful shutdown waits for tracked tasks, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl ServerConfig {
    /// Graceful shutdown budget.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".into(),
            hub: HubConfig::default(),
            professor_api_key: None,
            version: env!("CARGO_PKG_VERSION").into(),
            shutdown_timeout_ms: 4_000,
        }
    }
}
