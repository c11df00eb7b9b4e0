//! Hub timing and limits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::delivery::RetryPolicy;

/// Keepalive, frame-size and delivery settings shared by every connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// How long a connection may stay silent (no frames, no pongs) before
    /// it is considered dead, in milliseconds.
    pub pong_wait_ms: u64,
    /// Largest inbound frame accepted, in bytes.
    pub max_frame_size: usize,
    /// Total delivery attempts per recipient before a message is dropped.
    pub delivery_attempts: u32,
    /// Pause between delivery attempts, in milliseconds.
    pub delivery_retry_delay_ms: u64,
}

impl HubConfig {
    /// Idle-read deadline.
    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    /// Ping cadence: 90% of the pong wait, so a ping always lands inside
    /// the peer's reply window.
    pub fn ping_interval(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }

    /// Retry policy used by the broadcast handler.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.delivery_attempts,
            delay: Duration::from_millis(self.delivery_retry_delay_ms),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            pong_wait_ms: 10_000,
            max_frame_size: 512,
            delivery_attempts: 5,
            delivery_retry_delay_ms: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_keepalive_contract() {
        let cfg = HubConfig::default();
        assert_eq!(cfg.pong_wait(), Duration::from_secs(10));
        assert_eq!(cfg.ping_interval(), Duration::from_secs(9));
        assert_eq!(cfg.max_frame_size, 512);
    }

    #[test]
    fn ping_interval_scales_with_pong_wait() {
        let cfg = HubConfig {
            pong_wait_ms: 200,
            ..HubConfig::default()
        };
        assert_eq!(cfg.ping_interval(), Duration::from_millis(180));
    }

    #[test]
    fn default_retry_policy() {
        let policy = HubConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: HubConfig = serde_json::from_str(r#"{"pong_wait_ms":3000}"#).unwrap();
        assert_eq!(cfg.pong_wait_ms, 3000);
        assert_eq!(cfg.max_frame_size, 512);
        assert_eq!(cfg.delivery_attempts, 5);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = HubConfig {
            pong_wait_ms: 1,
            max_frame_size: 2,
            delivery_attempts: 3,
            delivery_retry_delay_ms: 4,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: HubConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
