//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ParleySettings::default()`]
//! 2. If `~/.parley/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `PARLEY_*` environment overrides (highest priority)
//!
//! Deep merge rules: objects merge recursively (source wins per key), arrays
//! and primitives are replaced entirely, nulls in source are skipped.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::ParleySettings;

/// Resolve the path to the settings file (`~/.parley/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".parley").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ParleySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; an unreadable or malformed file is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<ParleySettings> {
    let defaults = serde_json::to_value(ParleySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ParleySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key with source winning; anything else is replaced by
/// source. Nulls in source are skipped so a user file cannot erase defaults.
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

/// Apply `PARLEY_*` environment overrides to loaded settings.
///
/// Invalid values are ignored with a warning, falling back to file/defaults.
pub fn apply_env_overrides(settings: &mut ParleySettings) {
    if let Some(v) = read_env_string("PARLEY_API_URL") {
        settings.backend.api_base_url = v;
    }
    if let Some(v) = read_env_string("PARLEY_WS_URL") {
        settings.backend.ws_url = v;
    }
    if let Some(v) = read_env_u64("PARLEY_REQUEST_TIMEOUT_MS", 100, 600_000) {
        settings.backend.request_timeout_ms = v;
    }
    if let Some(v) = read_env_u32("PARLEY_MAX_RECONNECT_ATTEMPTS", 1, 100) {
        settings.connection.max_reconnect_attempts = v;
    }
    if let Some(v) = read_env_u64("PARLEY_BASE_DELAY_MS", 1, 600_000) {
        settings.connection.base_delay_ms = v;
    }
    if let Some(v) = read_env_string("PARLEY_LOG_LEVEL") {
        if let Ok(level) = serde_json::from_value(Value::String(v)) {
            settings.logging.level = level;
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": 10});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 10);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "backend": {"wsUrl": "ws://a", "apiBaseUrl": "http://a"}
        });
        let source = serde_json::json!({
            "backend": {"wsUrl": "ws://b"}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["backend"]["wsUrl"], "ws://b");
        assert_eq!(merged["backend"]["apiBaseUrl"], "http://a");
    }

    #[test]
    fn merge_skips_nulls() {
        let target = serde_json::json!({"keep": "original"});
        let source = serde_json::json!({"keep": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["keep"], "original");
    }

    #[test]
    fn merge_replaces_arrays() {
        let target = serde_json::json!({"xs": [1, 2, 3]});
        let source = serde_json::json!({"xs": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["xs"], serde_json::json!([9]));
    }

    #[test]
    fn merge_adds_new_keys() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"b": 2});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_u32_in_range() {
        assert_eq!(parse_u32_range("7", 1, 100), Some(7));
        assert_eq!(parse_u32_range("0", 1, 100), None);
        assert_eq!(parse_u32_range("101", 1, 100), None);
        assert_eq!(parse_u32_range("seven", 1, 100), None);
    }

    #[test]
    fn parse_u64_in_range() {
        assert_eq!(parse_u64_range("5000", 100, 600_000), Some(5000));
        assert_eq!(parse_u64_range("99", 100, 600_000), None);
        assert_eq!(parse_u64_range("", 100, 600_000), None);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.backend.ws_url, "ws://127.0.0.1:8080/ws");
    }

    #[test]
    fn user_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"connection": {"maxReconnectAttempts": 3}, "logging": {"level": "debug"}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.connection.max_reconnect_attempts, 3);
        assert_eq!(settings.logging.level.as_filter_str(), "debug");
        // Unmentioned groups keep their defaults.
        assert_eq!(settings.backend.request_timeout_ms, 10_000);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_settings_from_path(&path).is_err());
    }
}
