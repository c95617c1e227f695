//! Session bootstrap: cold start, warm start, and reset.
//!
//! The coordinator is the only writer of the active session id and the only
//! caller of the bootstrap REST interface. Bootstrap failures are surfaced
//! through an error watch and never retried automatically; connectivity is
//! the connection manager's concern.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{info, warn};

use parley_core::{SessionId, Timeline};

use crate::bootstrap::BootstrapClient;
use crate::errors::{BootstrapError, ClientError, ConnectionError};
use crate::manager::ConnectionManager;
use crate::storage::SessionStore;

/// Resolves the active session and drives the connection to it.
pub struct SessionCoordinator {
    bootstrap: BootstrapClient,
    store: Arc<dyn SessionStore>,
    timeline: Arc<Timeline>,
    manager: Arc<ConnectionManager>,
    active: RwLock<Option<SessionId>>,
    error_tx: watch::Sender<Option<String>>,
    in_flight: AtomicBool,
}

/// Releases the in-flight flag when a bootstrap call completes.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionCoordinator {
    /// Wire the coordinator to its collaborators.
    #[must_use]
    pub fn new(
        bootstrap: BootstrapClient,
        store: Arc<dyn SessionStore>,
        timeline: Arc<Timeline>,
        manager: Arc<ConnectionManager>,
    ) -> Self {
        let (error_tx, _) = watch::channel(None);
        Self {
            bootstrap,
            store,
            timeline,
            manager,
            active: RwLock::new(None),
            error_tx,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The currently adopted session id.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.active.read().clone()
    }

    /// Subscribe to the bootstrap error state consumed by presentation.
    #[must_use]
    pub fn errors(&self) -> watch::Receiver<Option<String>> {
        self.error_tx.subscribe()
    }

    /// Resolve the active session (resume or create) and attach to it.
    ///
    /// Cold start creates a fresh session and persists its id; warm start
    /// reuses the stored id and installs the session's history.
    pub async fn start(&self) -> Result<SessionId, ClientError> {
        let _guard = self.begin()?;

        let stored = self.store.load().unwrap_or_else(|error| {
            // An unreadable session file degrades to a cold start.
            warn!(%error, "could not read stored session, starting fresh");
            None
        });

        match stored {
            Some(session_id) => self.resume(session_id).await,
            None => self.create().await,
        }
    }

    /// Reset the conversation: clear history, adopt the returned id, re-join.
    pub async fn reset(&self) -> Result<SessionId, ClientError> {
        let _guard = self.begin()?;

        let Some(current) = self.active_session() else {
            return Err(ConnectionError::NoSession.into());
        };

        let new_id = self
            .bootstrap
            .reset_session(&current)
            .await
            .map_err(|e| self.surface(e))?;
        info!(old = %current, new = %new_id, "session reset");

        self.timeline.replace(Vec::new());
        self.adopt(&new_id);
        self.manager.connect(&new_id)?;
        Ok(new_id)
    }

    async fn create(&self) -> Result<SessionId, ClientError> {
        let session_id = self
            .bootstrap
            .create_session()
            .await
            .map_err(|e| self.surface(e))?;
        info!(%session_id, "session created");

        self.adopt(&session_id);
        self.manager.connect(&session_id)?;
        Ok(session_id)
    }

    async fn resume(&self, session_id: SessionId) -> Result<SessionId, ClientError> {
        info!(%session_id, "resuming stored session");
        *self.active.write() = Some(session_id.clone());
        self.manager.connect(&session_id)?;

        // History is fetched separately from the attach; the timeline is
        // installed wholesale once it arrives.
        let history = self
            .bootstrap
            .get_history(&session_id)
            .await
            .map_err(|e| self.surface(e))?;
        self.timeline.replace(history);
        let _ = self.error_tx.send(None);
        Ok(session_id)
    }

    /// Atomically replace the active id and persist it.
    fn adopt(&self, session_id: &SessionId) {
        *self.active.write() = Some(session_id.clone());
        if let Err(error) = self.store.save(session_id) {
            // The session still works this process; only resumption is lost.
            warn!(%error, "failed to persist session id");
        }
        let _ = self.error_tx.send(None);
    }

    /// Reject re-entrant bootstrap calls; the flag is released on drop.
    fn begin(&self) -> Result<InFlightGuard<'_>, ClientError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(BootstrapError::InFlight.into());
        }
        Ok(InFlightGuard(&self.in_flight))
    }

    fn surface(&self, error: BootstrapError) -> ClientError {
        warn!(%error, "bootstrap call failed");
        let _ = self.error_tx.send(Some(error.to_string()));
        ClientError::Bootstrap(error)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
