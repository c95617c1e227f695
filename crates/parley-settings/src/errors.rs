//! Settings error types.

use thiserror::Error;

/// Result alias for settings operations.
pub type Result<T, E = SettingsError> = std::result::Result<T, E>;

/// Failures while loading or parsing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file contained invalid JSON or an invalid shape.
    #[error("failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}
