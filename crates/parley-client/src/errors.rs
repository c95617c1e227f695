//! Error hierarchy for the session core.
//!
//! Three domains, matching the failure taxonomy of the client:
//!
//! - [`BootstrapError`]: REST create/history/reset failures — surfaced, never
//!   retried automatically
//! - [`StorageError`]: session-id persistence failures
//! - [`ConnectionError`]: locally rejected connection operations
//!
//! Connectivity faults are not errors: they are handled inside the connection
//! driver via backoff and reported through the status watch.

use thiserror::Error;

/// Result alias for client operations.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Top-level error type for the session core.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bootstrap REST call failed.
    #[error("{0}")]
    Bootstrap(#[from] BootstrapError),

    /// Session-id persistence failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// A connection operation was rejected locally.
    #[error("{0}")]
    Connection(#[from] ConnectionError),
}

/// Failures talking to the REST bootstrap backend.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Transport-level failure (DNS, refused connection, timeout).
    #[error("bootstrap request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("bootstrap request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Backend-provided message, or the status reason.
        message: String,
    },

    /// The backend response was missing a required field.
    #[error("malformed bootstrap response: {0}")]
    Malformed(String),

    /// Another bootstrap call is still outstanding.
    #[error("a bootstrap call is already in flight")]
    InFlight,
}

/// Failures persisting or reading the session id.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("session storage io: {0}")]
    Io(#[from] std::io::Error),

    /// The stored file did not parse.
    #[error("session storage parse: {0}")]
    Json(#[from] serde_json::Error),
}

/// Locally rejected connection operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// `connect` was called without a session id; no attempt is made
    /// without an identity.
    #[error("cannot connect without a session id")]
    NoSession,
}
