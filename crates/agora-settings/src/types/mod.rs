//! Settings types.
//!
//! Every struct uses `#[serde(default)]` so a partial settings file only
//! needs to mention what it overrides.

mod hub;
mod server;

pub use hub::HubSettings;
pub use server::{AuthSettings, LogFormat, LoggingSettings, ServerSettings};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgoraSettings {
    /// Network binding.
    pub server: ServerSettings,
    /// Realtime hub tuning.
    pub hub: HubSettings,
    /// Token verification.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl AgoraSettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.hub.validate()?;
        if self.server.max_connections == 0 {
            return Err(SettingsError::invalid("server.maxConnections", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AgoraSettings::default().validate().unwrap();
    }

    #[test]
    fn zero_max_connections_rejected() {
        let mut settings = AgoraSettings::default();
        settings.server.max_connections = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("maxConnections"));
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(AgoraSettings::default()).unwrap();
        assert!(value["hub"]["queueCapacity"].is_number());
        assert!(value["server"]["maxConnections"].is_number());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: AgoraSettings =
            serde_json::from_str(r#"{"hub": {"queueCapacity": 8}}"#).unwrap();
        assert_eq!(settings.hub.queue_capacity, 8);
        assert_eq!(settings.hub.pong_wait_ms, HubSettings::default().pong_wait_ms);
        assert_eq!(settings.server.port, ServerSettings::default().port);
    }
}
