//! Realtime hub tuning.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Per-session queue, liveness and frame limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Capacity of each session's outbound queue. A route that finds the
    /// queue full evicts the session.
    pub queue_capacity: usize,
    /// Interval between server pings in milliseconds.
    pub ping_interval_ms: u64,
    /// How long a session may stay silent (no frame, no pong) before it is
    /// closed, in milliseconds.
    pub pong_wait_ms: u64,
    /// Upper bound for a single socket write in milliseconds.
    pub write_wait_ms: u64,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_bytes: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            ping_interval_ms: 54_000,
            pong_wait_ms: 60_000,
            write_wait_ms: 10_000,
            max_message_bytes: 4096,
        }
    }
}

impl HubSettings {
    /// Reject combinations the hub cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(SettingsError::invalid("hub.queueCapacity", "must be at least 1"));
        }
        if self.max_message_bytes == 0 {
            return Err(SettingsError::invalid("hub.maxMessageBytes", "must be at least 1"));
        }
        if self.write_wait_ms == 0 {
            return Err(SettingsError::invalid("hub.writeWaitMs", "must be non-zero"));
        }
        if self.ping_interval_ms == 0 {
            return Err(SettingsError::invalid("hub.pingIntervalMs", "must be non-zero"));
        }
        if self.ping_interval_ms >= self.pong_wait_ms {
            return Err(SettingsError::invalid(
                "hub.pingIntervalMs",
                format!(
                    "{} must be below hub.pongWaitMs ({})",
                    self.ping_interval_ms, self.pong_wait_ms
                ),
            ));
        }
        Ok(())
    }
}
