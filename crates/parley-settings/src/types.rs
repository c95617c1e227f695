//! Settings type definitions with compiled defaults.
//!
//! Every group deserializes with `default` so a partial user file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level settings for the Parley client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Backend endpoints.
    pub backend: BackendSettings,
    /// Reconnect behavior.
    pub connection: ConnectionSettings,
    /// Local state locations.
    pub storage: StorageSettings,
    /// Log verbosity.
    pub logging: LoggingSettings,
}

impl Default for ParleySettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "parley".to_string(),
            backend: BackendSettings::default(),
            connection: ConnectionSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ParleySettings {
    /// Directory for local client state (`~/<storage.dir>`).
    #[must_use]
    pub fn storage_dir(&self) -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(&self.storage.dir)
    }

    /// Path of the persisted session-id file.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.storage_dir().join(&self.storage.session_file)
    }
}

/// Backend endpoints and request behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    /// Base URL of the REST bootstrap interface.
    pub api_base_url: String,
    /// URL of the realtime WebSocket endpoint.
    pub ws_url: String,
    /// Per-request timeout for bootstrap calls, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api".to_string(),
            ws_url: "ws://127.0.0.1:8080/ws".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Reconnect behavior for the session connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Reconnect attempt cap per failure-run.
    pub max_reconnect_attempts: u32,
    /// Base backoff delay in milliseconds, doubled per attempt.
    pub base_delay_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            base_delay_ms: 1000,
        }
    }
}

/// Where the client keeps its local state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// State directory, relative to `$HOME`.
    pub dir: String,
    /// File holding the persisted session id, relative to `dir`.
    pub session_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: ".parley".to_string(),
            session_file: "session.json".to_string(),
        }
    }
}

/// Log verbosity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level for the tracing subscriber.
    pub level: LogLevel,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}

/// Log level accepted in settings files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Lifecycle events (default).
    #[default]
    Info,
    /// Frame-level detail.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// The level as an `EnvFilter` directive.
    #[must_use]
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_with_defaults() {
        let json = r#"{"backend": {"wsUrl": "ws://example.test/ws"}}"#;
        let settings: ParleySettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.backend.ws_url, "ws://example.test/ws");
        // Untouched fields keep their defaults.
        assert_eq!(settings.backend.api_base_url, "http://127.0.0.1:8080/api");
        assert_eq!(settings.connection.max_reconnect_attempts, 5);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(ParleySettings::default()).unwrap();
        assert!(json["backend"]["apiBaseUrl"].is_string());
        assert!(json["connection"]["maxReconnectAttempts"].is_u64());
        assert!(json["storage"]["sessionFile"].is_string());
    }

    #[test]
    fn log_level_parses_lowercase() {
        let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(level, LogLevel::Debug);
        assert_eq!(level.as_filter_str(), "debug");
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!(serde_json::from_str::<LogLevel>("\"verbose\"").is_err());
    }
}
