//! Persistence of the active session id.
//!
//! A single fixed key-value pair: read once at startup, written whenever the
//! coordinator adopts a new id. The file-backed implementation keeps a small
//! JSON document under the client's state directory.

use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use parley_core::SessionId;

use crate::errors::StorageError;

/// Get/set contract for the persisted session id.
pub trait SessionStore: Send + Sync {
    /// The stored session id, if any.
    fn load(&self) -> Result<Option<SessionId>, StorageError>;

    /// Persist the session id, replacing any previous value.
    fn save(&self, session_id: &SessionId) -> Result<(), StorageError>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    session_id: String,
}

/// JSON-file-backed store (`~/.parley/session.json`).
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store backed by the given file path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<SessionId>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let stored: StoredSession = serde_json::from_str(&content)?;
        if stored.session_id.is_empty() {
            return Ok(None);
        }
        Ok(Some(SessionId::from(stored.session_id)))
    }

    fn save(&self, session_id: &SessionId) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredSession {
            session_id: session_id.to_string(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<SessionId>>,
}

impl MemorySessionStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a session id.
    #[must_use]
    pub fn with_session(session_id: SessionId) -> Self {
        Self {
            inner: Mutex::new(Some(session_id)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionId>, StorageError> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, session_id: &SessionId) -> Result<(), StorageError> {
        *self.inner.lock() = Some(session_id.clone());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
