//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AgoraSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `AGORA_*` environment overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{AgoraSettings, LogFormat};

/// Resolve the default settings file path (`~/.agora/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".agora").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<AgoraSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON, or values that
/// fail validation, is an error.
pub fn load_settings_from_path(path: &Path) -> Result<AgoraSettings> {
    load_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load_settings_from_path`] with an injectable env lookup.
pub fn load_with_env<F>(path: &Path, env: F) -> Result<AgoraSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(AgoraSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: AgoraSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `AGORA_*` overrides read through `env`.
///
/// Invalid values are ignored with a warning (file/default value stays).
pub fn apply_env_overrides<F>(settings: &mut AgoraSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = |key: &str| env(key).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env("AGORA_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = parsed(&env, "AGORA_PORT", |s| parse_u16_range(s, 0, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = parsed(&env, "AGORA_MAX_CONNECTIONS", |s| {
        parse_usize_range(s, 1, 1_000_000)
    }) {
        settings.server.max_connections = v;
    }

    // ── Hub ─────────────────────────────────────────────────────────
    if let Some(v) = parsed(&env, "AGORA_QUEUE_CAPACITY", |s| parse_usize_range(s, 1, 65_536)) {
        settings.hub.queue_capacity = v;
    }
    if let Some(v) = parsed(&env, "AGORA_PING_INTERVAL_MS", |s| {
        parse_u64_range(s, 100, 3_600_000)
    }) {
        settings.hub.ping_interval_ms = v;
    }
    if let Some(v) = parsed(&env, "AGORA_PONG_WAIT_MS", |s| parse_u64_range(s, 100, 3_600_000)) {
        settings.hub.pong_wait_ms = v;
    }
    if let Some(v) = parsed(&env, "AGORA_WRITE_WAIT_MS", |s| parse_u64_range(s, 100, 600_000)) {
        settings.hub.write_wait_ms = v;
    }
    if let Some(v) = parsed(&env, "AGORA_MAX_MESSAGE_BYTES", |s| {
        parse_usize_range(s, 64, 16 * 1024 * 1024)
    }) {
        settings.hub.max_message_bytes = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = env("AGORA_JWT_SECRET") {
        settings.auth.jwt_secret = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env("AGORA_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = parsed(&env, "AGORA_LOG_FORMAT", parse_log_format) {
        settings.logging.format = v;
    }
}

fn parsed<E, T, P>(env: &E, key: &str, parse: P) -> Option<T>
where
    E: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let raw = env(key)?;
    let value = parse(&raw);
    if value.is_none() {
        warn!(key, value = %raw, "invalid env var, ignoring");
    }
    value
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "compact" | "text" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}
