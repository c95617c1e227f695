//! Async connection manager owning the session transport.
//!
//! One driver task per `connect` call owns the WebSocket for its entire
//! lifetime; nothing else ever holds the stream. The driver walks the
//! [`ConnectionFsm`] through dial, open, fault, and backoff, re-sending
//! `join:session` on every open so the backend re-attaches the session after
//! a reconnect. A new `connect` supersedes (tears down) any prior driver, so
//! no two attempts are ever concurrently in flight.
//!
//! `disconnect` cancels the driver through a `CancellationToken`; a pending
//! backoff timer observes the cancellation and must never resurrect the
//! connection afterwards.

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_core::SessionId;
use parley_core::retry::ReconnectPolicy;

use crate::errors::ConnectionError;
use crate::fsm::{ConnectionFsm, InterruptOutcome};
use crate::wire::{ClientFrame, ServerFrame};

/// Connection status visible to observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No transport (initial, or between reconnect attempts).
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// The transport is open and joined.
    Connected,
    /// Reconnect attempts are exhausted; manual intervention required.
    Degraded,
    /// Explicitly torn down.
    Closed,
}

/// Inbound session events surfaced to the runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A complete assistant reply.
    Reply {
        /// Full reply text.
        text: String,
        /// Optional source citations.
        sources: Option<String>,
    },
    /// A session-scoped error reported by the backend.
    BackendError {
        /// Human-readable description.
        message: String,
    },
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Owns the session transport and its reconnect lifecycle.
pub struct ConnectionManager {
    ws_url: String,
    policy: ReconnectPolicy,
    status_tx: watch::Sender<ConnectionStatus>,
    events_tx: mpsc::Sender<SessionEvent>,
    outbound_tx: Mutex<Option<mpsc::Sender<ClientFrame>>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl ConnectionManager {
    /// Create a manager for the given WebSocket endpoint.
    ///
    /// Returns the manager and the receiver for inbound session events.
    #[must_use]
    pub fn new(
        ws_url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        (
            Self {
                ws_url: ws_url.into(),
                policy,
                status_tx,
                events_tx,
                outbound_tx: Mutex::new(None),
                cancel: Mutex::new(None),
            },
            events_rx,
        )
    }

    /// Subscribe to connection status changes.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Whether the transport is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.status_tx.borrow() == ConnectionStatus::Connected
    }

    /// Establish the session transport, superseding any prior attempt.
    ///
    /// Rejected without a session id: no connection attempt is made without
    /// an identity. Must be called from within a tokio runtime.
    pub fn connect(&self, session_id: &SessionId) -> Result<(), ConnectionError> {
        if session_id.is_empty() {
            warn!("connect rejected: no session id");
            return Err(ConnectionError::NoSession);
        }

        // A reconnect replaces a prior transport, never layers one on top.
        self.teardown();

        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        *self.cancel.lock() = Some(cancel.clone());
        *self.outbound_tx.lock() = Some(outbound_tx);

        drop(tokio::spawn(drive(
            session_url(&self.ws_url, session_id),
            session_id.clone(),
            self.policy.clone(),
            self.status_tx.clone(),
            self.events_tx.clone(),
            outbound_rx,
            cancel,
        )));
        Ok(())
    }

    /// Tear down the transport and cancel any pending reconnect timer.
    pub fn disconnect(&self) {
        self.teardown();
        let _ = self.status_tx.send(ConnectionStatus::Closed);
    }

    /// Re-attach to the session's event stream. Silent no-op while not
    /// connected; the caller re-joins after reconnection instead of the
    /// manager buffering control frames.
    pub async fn join(&self, session_id: &SessionId) {
        self.emit(ClientFrame::Join {
            session_id: session_id.to_string(),
        })
        .await;
    }

    /// Detach from the session's event stream. Silent no-op while not
    /// connected.
    pub async fn leave(&self, session_id: &SessionId) {
        self.emit(ClientFrame::Leave {
            session_id: session_id.to_string(),
        })
        .await;
    }

    /// Send a user message. Silent no-op while not connected; there is no
    /// outbound queue.
    pub async fn send_message(&self, text: &str) {
        self.emit(ClientFrame::Send {
            text: text.to_owned(),
        })
        .await;
    }

    fn teardown(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
        let _ = self.outbound_tx.lock().take();
    }

    async fn emit(&self, frame: ClientFrame) {
        if !self.is_connected() {
            debug!(?frame, "not connected, dropping outbound frame");
            return;
        }
        let sender = self.outbound_tx.lock().clone();
        if let Some(sender) = sender {
            if sender.send(frame).await.is_err() {
                debug!("driver gone, dropping outbound frame");
            }
        }
    }
}

/// Append the session id as connection metadata.
fn session_url(ws_url: &str, session_id: &SessionId) -> String {
    let separator = if ws_url.contains('?') { '&' } else { '?' };
    format!("{ws_url}{separator}sessionId={session_id}")
}

/// How a single transport run ended.
enum RunEnd {
    /// Connectivity fault (dial failure, peer close, or transport error).
    Fault,
    /// Deliberate teardown; do not reconnect.
    Shutdown,
}

/// Driver task: dial, join, pump, and back off until closed or exhausted.
async fn drive(
    url: String,
    session_id: SessionId,
    policy: ReconnectPolicy,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::Sender<SessionEvent>,
    mut outbound: mpsc::Receiver<ClientFrame>,
    cancel: CancellationToken,
) {
    let mut fsm = ConnectionFsm::new(policy);
    loop {
        if !fsm.begin_connect() {
            break;
        }
        send_status(&status, &cancel, ConnectionStatus::Connecting);

        match run_transport(
            &url,
            &session_id,
            &mut fsm,
            &status,
            &events,
            &mut outbound,
            &cancel,
        )
        .await
        {
            RunEnd::Shutdown => {
                fsm.close();
                break;
            }
            RunEnd::Fault => match fsm.on_interrupt() {
                InterruptOutcome::Retry { attempt, delay } => {
                    send_status(&status, &cancel, ConnectionStatus::Disconnected);
                    info!(attempt, ?delay, "scheduling reconnect");
                    tokio::select! {
                        () = cancel.cancelled() => {
                            fsm.close();
                            break;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                InterruptOutcome::GiveUp => {
                    warn!("reconnect attempts exhausted, staying disconnected");
                    send_status(&status, &cancel, ConnectionStatus::Degraded);
                    break;
                }
                InterruptOutcome::Ignore => break,
            },
        }
    }
}

/// One dial-to-teardown run over a single transport.
async fn run_transport(
    url: &str,
    session_id: &SessionId,
    fsm: &mut ConnectionFsm,
    status: &watch::Sender<ConnectionStatus>,
    events: &mpsc::Sender<SessionEvent>,
    outbound: &mut mpsc::Receiver<ClientFrame>,
    cancel: &CancellationToken,
) -> RunEnd {
    let dial = tokio::select! {
        () = cancel.cancelled() => return RunEnd::Shutdown,
        result = connect_async(url) => result,
    };
    let mut ws = match dial {
        Ok((ws, _)) => ws,
        Err(error) => {
            warn!(%error, "websocket dial failed");
            return RunEnd::Fault;
        }
    };

    if fsm.on_open() {
        send_status(status, cancel, ConnectionStatus::Connected);
        info!(session_id = %session_id, "session transport connected");
    }

    // Re-attach to the session's event stream on every open.
    let join = ClientFrame::Join {
        session_id: session_id.to_string(),
    };
    if send_frame(&mut ws, &join).await.is_err() {
        return RunEnd::Fault;
    }

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws.close(None).await;
                return RunEnd::Shutdown;
            }
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if send_frame(&mut ws, &frame).await.is_err() {
                        return RunEnd::Fault;
                    }
                }
                None => {
                    // Manager dropped its sender: deliberate teardown.
                    let _ = ws.close(None).await;
                    return RunEnd::Shutdown;
                }
            },
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => dispatch(text.as_str(), events).await,
                Some(Ok(Message::Close(_))) | None => {
                    info!("transport closed by peer");
                    return RunEnd::Fault;
                }
                Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                Some(Err(error)) => {
                    warn!(%error, "transport error");
                    return RunEnd::Fault;
                }
            },
        }
    }
}

async fn send_frame(ws: &mut WsStream, frame: &ClientFrame) -> tungstenite::Result<()> {
    match serde_json::to_string(frame) {
        Ok(text) => ws.send(Message::Text(text.into())).await,
        Err(error) => {
            warn!(%error, "failed to encode outbound frame");
            Ok(())
        }
    }
}

async fn dispatch(text: &str, events: &mpsc::Sender<SessionEvent>) {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame::Reply { ai_text, sources }) => {
            if events
                .send(SessionEvent::Reply {
                    text: ai_text,
                    sources,
                })
                .await
                .is_err()
            {
                debug!("event receiver dropped, discarding reply");
            }
        }
        Ok(ServerFrame::Error { message }) => {
            warn!(%message, "backend reported chat error");
            if events
                .send(SessionEvent::BackendError { message })
                .await
                .is_err()
            {
                debug!("event receiver dropped, discarding error");
            }
        }
        Err(error) => debug!(%error, frame = text, "dropping unparseable frame"),
    }
}

/// Status updates are suppressed once cancelled so a superseded driver
/// cannot clobber the state of its replacement.
fn send_status(
    status: &watch::Sender<ConnectionStatus>,
    cancel: &CancellationToken,
    value: ConnectionStatus,
) {
    if !cancel.is_cancelled() {
        let _ = status.send(value);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
