//! The per-process session runtime.
//!
//! One `SessionRuntime` is constructed per process and passed by reference to
//! whichever layer needs to read or dispatch — there are no ambient
//! singletons. It owns the timeline, the connection manager, the bootstrap
//! coordinator, and the inbound event pump that feeds the aggregator.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use parley_core::{Message, SessionId, Timeline};
use parley_core::retry::ReconnectPolicy;
use parley_settings::ParleySettings;

use crate::aggregator::StreamingAggregator;
use crate::bootstrap::BootstrapClient;
use crate::coordinator::SessionCoordinator;
use crate::errors::{ClientError, Result};
use crate::manager::{ConnectionManager, ConnectionStatus, SessionEvent};
use crate::storage::{FileSessionStore, SessionStore};

/// Owns one conversation and its connection for the process lifetime.
pub struct SessionRuntime {
    timeline: Arc<Timeline>,
    manager: Arc<ConnectionManager>,
    coordinator: SessionCoordinator,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl SessionRuntime {
    /// Build a runtime from settings, persisting the session id under the
    /// configured storage path. Must be called within a tokio runtime.
    pub fn new(settings: &ParleySettings) -> Result<Self> {
        let store = Arc::new(FileSessionStore::new(settings.session_path()));
        Self::with_store(settings, store)
    }

    /// Build a runtime with an injected session store.
    pub fn with_store(
        settings: &ParleySettings,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let timeline = Arc::new(Timeline::new());
        let policy = ReconnectPolicy {
            max_attempts: settings.connection.max_reconnect_attempts,
            base_delay_ms: settings.connection.base_delay_ms,
        };
        let (manager, events) = ConnectionManager::new(settings.backend.ws_url.clone(), policy);
        let manager = Arc::new(manager);

        let bootstrap = BootstrapClient::new(
            settings.backend.api_base_url.clone(),
            std::time::Duration::from_millis(settings.backend.request_timeout_ms),
        )
        .map_err(ClientError::Bootstrap)?;

        let coordinator = SessionCoordinator::new(
            bootstrap,
            store,
            timeline.clone(),
            manager.clone(),
        );

        let aggregator = StreamingAggregator::new(timeline.clone());
        let pump = tokio::spawn(pump_events(events, aggregator));

        Ok(Self {
            timeline,
            manager,
            coordinator,
            pump: Mutex::new(Some(pump)),
        })
    }

    /// Resolve the session (resume or create) and connect to it.
    pub async fn start(&self) -> Result<SessionId> {
        self.coordinator.start().await
    }

    /// Reset the conversation to an empty timeline under a fresh session.
    pub async fn reset(&self) -> Result<SessionId> {
        self.coordinator.reset().await
    }

    /// Append the user's message to the timeline and emit it while
    /// connected. When disconnected the emit is a silent no-op; the message
    /// still appears locally, matching the append-then-emit contract.
    pub async fn send_message(&self, text: &str) {
        self.timeline.append(Message::user(text));
        self.manager.send_message(text).await;
    }

    /// The conversation timeline.
    #[must_use]
    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    /// Subscribe to connection status changes.
    #[must_use]
    pub fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.manager.status()
    }

    /// Subscribe to the bootstrap error state.
    #[must_use]
    pub fn bootstrap_errors(&self) -> watch::Receiver<Option<String>> {
        self.coordinator.errors()
    }

    /// The currently adopted session id.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.coordinator.active_session()
    }

    /// Tear down the connection and stop the event pump.
    pub fn shutdown(&self) {
        self.manager.disconnect();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Feed inbound server events into the aggregator until the channel closes.
async fn pump_events(mut events: mpsc::Receiver<SessionEvent>, aggregator: StreamingAggregator) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Reply { text, sources } => {
                let _ = aggregator.handle_reply(&text, sources.as_deref());
            }
            SessionEvent::BackendError { message } => {
                warn!(%message, "session error from backend");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
