//! # agora-settings
//!
//! Configuration for the Agora realtime hub, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`AgoraSettings::default()`]
//! 2. **Settings file**: `~/.agora/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `AGORA_*` overrides (highest priority)
//!
//! The loaded value is passed explicitly to whatever needs it; there is no
//! process-global settings instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, load_with_env, settings_path};
pub use types::*;
