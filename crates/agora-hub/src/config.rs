//! Hub runtime configuration.

use std::time::Duration;

use agora_settings::AgoraSettings;

use crate::errors::ConfigError;
use crate::websocket::heartbeat::LivenessConfig;

/// Everything the server and its sessions need at runtime.
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrent websocket sessions.
    pub max_connections: usize,
    /// Capacity of each session's outbound queue.
    pub queue_capacity: usize,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_bytes: usize,
    /// Ping, pong and write timings.
    pub liveness: LivenessConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 10_000,
            queue_capacity: 256,
            max_message_bytes: 4096,
            liveness: LivenessConfig::default(),
        }
    }
}

impl HubConfig {
    /// Derive from loaded settings.
    pub fn from_settings(settings: &AgoraSettings) -> Self {
        let hub = &settings.hub;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_connections: settings.server.max_connections,
            queue_capacity: hub.queue_capacity,
            max_message_bytes: hub.max_message_bytes,
            liveness: LivenessConfig::from_millis(
                hub.ping_interval_ms,
                hub.pong_wait_ms,
                hub.write_wait_ms,
            ),
        }
    }

    /// Reject values the hub cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        self.liveness.validate()
    }

    /// Shorten every liveness timing, for tests that exercise timeouts.
    #[must_use]
    pub fn with_liveness(mut self, ping: Duration, pong_wait: Duration, write_wait: Duration) -> Self {
        self.liveness = LivenessConfig {
            ping_interval: ping,
            pong_wait,
            write_wait,
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_are_valid() {
        HubConfig::default().validate().unwrap();
    }

    #[test]
    fn from_default_settings() {
        let cfg = HubConfig::from_settings(&AgoraSettings::default());
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8090);
        assert_eq!(cfg.queue_capacity, 256);
        assert_eq!(cfg.max_message_bytes, 4096);
        assert_eq!(cfg.liveness, LivenessConfig::default());
    }

    #[test]
    fn zero_queue_capacity_rejected() {
        let cfg = HubConfig {
            queue_capacity: 0,
            ..HubConfig::default()
        };
        assert_matches!(cfg.validate(), Err(ConfigError::ZeroQueueCapacity));
    }

    #[test]
    fn liveness_errors_surface() {
        let cfg = HubConfig::default().with_liveness(
            Duration::from_secs(2),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert_matches!(cfg.validate(), Err(ConfigError::PingNotBelowPongWait { .. }));
    }
}
