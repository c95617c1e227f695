//! End-to-end scenarios against an in-process fake backend.
//!
//! The backend serves the bootstrap REST endpoints and a WebSocket that
//! records `join:session` frames and answers every chat message with a
//! canned reply, so the full cold-start / warm-start / reset / reconnect
//! flows run over real sockets.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{any, get, post};
use axum::Json;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::timeout;

use parley_client::manager::ConnectionStatus;
use parley_client::runtime::SessionRuntime;
use parley_client::storage::{MemorySessionStore, SessionStore};
use parley_core::{Sender, SessionId};
use parley_settings::ParleySettings;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state of the fake backend.
struct Backend {
    create_id: String,
    reset_id: String,
    history: Mutex<Vec<Value>>,
    /// Session ids seen in `join:session` frames, in arrival order.
    joins: Mutex<Vec<String>>,
    /// `sessionId` query params seen at WebSocket attach time.
    connect_params: Mutex<Vec<String>>,
    /// When set, the next WebSocket connection is dropped immediately.
    drop_next: AtomicBool,
}

impl Backend {
    fn new(create_id: &str, reset_id: &str) -> Arc<Self> {
        Arc::new(Self {
            create_id: create_id.to_string(),
            reset_id: reset_id.to_string(),
            history: Mutex::new(Vec::new()),
            joins: Mutex::new(Vec::new()),
            connect_params: Mutex::new(Vec::new()),
            drop_next: AtomicBool::new(false),
        })
    }

    fn joined(&self, session_id: &str) -> bool {
        self.joins.lock().iter().any(|j| j == session_id)
    }
}

async fn create_session(State(state): State<Arc<Backend>>) -> Json<Value> {
    Json(json!({ "sessionId": state.create_id }))
}

async fn get_history(
    State(state): State<Arc<Backend>>,
    Path(_session_id): Path<String>,
) -> Json<Value> {
    Json(json!({ "history": *state.history.lock() }))
}

async fn reset_session(State(state): State<Arc<Backend>>) -> Json<Value> {
    Json(json!({ "sessionId": state.reset_id }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<Backend>>,
) -> impl IntoResponse {
    if let Some(session_id) = params.get("sessionId") {
        state.connect_params.lock().push(session_id.clone());
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<Backend>) {
    if state.drop_next.swap(false, Ordering::SeqCst) {
        // Simulate a peer-side close right after the upgrade.
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        match frame["type"].as_str() {
            Some("join:session") => {
                let session_id = frame["sessionId"].as_str().unwrap_or_default().to_string();
                state.joins.lock().push(session_id);
            }
            Some("chat:send:message") => {
                let reply = json!({
                    "type": "chat:message:received",
                    "aiText": "hi there",
                });
                if socket
                    .send(Message::Text(reply.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            _ => {}
        }
    }
}

/// Boot the fake backend; returns its `host:port`.
async fn spawn_backend(backend: Arc<Backend>) -> String {
    let app = Router::new()
        .route("/chat/session", post(create_session))
        .route("/chat/history/{session_id}", get(get_history))
        .route("/chat/session/reset", post(reset_session))
        .route("/ws", any(ws_handler))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    }));
    addr.to_string()
}

fn settings_for(addr: &str) -> ParleySettings {
    let mut settings = ParleySettings::default();
    settings.backend.api_base_url = format!("http://{addr}");
    settings.backend.ws_url = format!("ws://{addr}/ws");
    settings.connection.base_delay_ms = 25;
    settings.connection.max_reconnect_attempts = 5;
    settings
}

/// Poll until `condition` holds, bounded by [`TIMEOUT`].
async fn eventually(condition: impl Fn() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn await_connected(runtime: &SessionRuntime) {
    let mut status = runtime.connection_status();
    let _ = timeout(
        TIMEOUT,
        status.wait_for(|s| *s == ConnectionStatus::Connected),
    )
    .await
    .expect("timed out waiting for connected")
    .unwrap();
}

fn history_entry(id: &str, text: &str, sender: &str) -> Value {
    json!({
        "id": id,
        "text": text,
        "sender": sender,
        "timestamp": "2025-01-01T00:00:00Z",
    })
}

#[tokio::test]
async fn cold_start_creates_session_and_joins() {
    let backend = Backend::new("s1", "s1-next");
    let addr = spawn_backend(backend.clone()).await;
    let runtime =
        SessionRuntime::with_store(&settings_for(&addr), Arc::new(MemorySessionStore::new()))
            .unwrap();

    let session_id = runtime.start().await.unwrap();
    assert_eq!(session_id, SessionId::from("s1"));

    await_connected(&runtime).await;
    eventually(|| backend.joined("s1"), "join:session for s1").await;

    // The session id rode along as connection metadata.
    assert!(backend.connect_params.lock().contains(&"s1".to_string()));
}

#[tokio::test]
async fn cold_start_persists_the_adopted_id() {
    let backend = Backend::new("s1", "s1-next");
    let addr = spawn_backend(backend).await;
    let store = Arc::new(MemorySessionStore::new());
    let runtime = SessionRuntime::with_store(&settings_for(&addr), store.clone()).unwrap();

    let _ = runtime.start().await.unwrap();
    assert_eq!(store.load().unwrap(), Some(SessionId::from("s1")));
}

#[tokio::test]
async fn send_while_connected_yields_user_then_bot_reply() {
    let backend = Backend::new("s1", "s1-next");
    let addr = spawn_backend(backend.clone()).await;
    let runtime =
        SessionRuntime::with_store(&settings_for(&addr), Arc::new(MemorySessionStore::new()))
            .unwrap();

    let _ = runtime.start().await.unwrap();
    await_connected(&runtime).await;
    eventually(|| backend.joined("s1"), "join:session for s1").await;

    runtime.send_message("hello").await;

    let timeline = runtime.timeline().clone();
    eventually(|| timeline.len() == 2, "user message plus reply").await;

    let snapshot = timeline.snapshot();
    assert_eq!(snapshot[0].text, "hello");
    assert_eq!(snapshot[0].sender, Sender::User);
    assert_eq!(snapshot[1].text, "hi there");
    assert_eq!(snapshot[1].sender, Sender::Bot);
    assert!(!snapshot[1].is_streaming);
}

#[tokio::test]
async fn warm_start_installs_history_and_joins() {
    let backend = Backend::new("unused", "s2-next");
    {
        let mut history = backend.history.lock();
        history.push(history_entry("m1", "first", "user"));
        history.push(history_entry("m2", "second", "bot"));
        history.push(history_entry("m3", "third", "user"));
    }
    let addr = spawn_backend(backend.clone()).await;
    let store = Arc::new(MemorySessionStore::with_session(SessionId::from("s2")));
    let runtime = SessionRuntime::with_store(&settings_for(&addr), store).unwrap();

    let session_id = runtime.start().await.unwrap();
    assert_eq!(session_id, SessionId::from("s2"));

    await_connected(&runtime).await;
    eventually(|| backend.joined("s2"), "join:session for s2").await;

    let texts: Vec<String> = runtime
        .timeline()
        .snapshot()
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

#[tokio::test]
async fn reset_empties_timeline_and_joins_the_new_session() {
    let backend = Backend::new("unused", "s3");
    {
        let mut history = backend.history.lock();
        for i in 0..5 {
            history.push(history_entry(
                &format!("m{i}"),
                &format!("old {i}"),
                "user",
            ));
        }
    }
    let addr = spawn_backend(backend.clone()).await;
    let store = Arc::new(MemorySessionStore::with_session(SessionId::from("s2")));
    let runtime = SessionRuntime::with_store(&settings_for(&addr), store.clone()).unwrap();

    let _ = runtime.start().await.unwrap();
    await_connected(&runtime).await;
    assert_eq!(runtime.timeline().len(), 5);

    let new_id = runtime.reset().await.unwrap();
    assert_eq!(new_id, SessionId::from("s3"));
    assert!(runtime.timeline().is_empty());

    eventually(|| backend.joined("s3"), "join:session for s3").await;
    assert_eq!(runtime.active_session(), Some(SessionId::from("s3")));
    assert_eq!(store.load().unwrap(), Some(SessionId::from("s3")));
}

#[tokio::test]
async fn dropped_connection_reconnects_and_rejoins() {
    let backend = Backend::new("s1", "s1-next");
    // The first WebSocket connection is dropped by the peer right away.
    backend.drop_next.store(true, Ordering::SeqCst);
    let addr = spawn_backend(backend.clone()).await;
    let runtime =
        SessionRuntime::with_store(&settings_for(&addr), Arc::new(MemorySessionStore::new()))
            .unwrap();

    let _ = runtime.start().await.unwrap();

    // The retry lands on the healthy listener and re-sends the join.
    eventually(|| backend.joined("s1"), "rejoin after reconnect").await;
    await_connected(&runtime).await;

    // Two attach attempts reached the backend.
    assert_eq!(
        backend.connect_params.lock().len(),
        2,
        "expected the initial attach plus one reconnect"
    );
}

#[tokio::test]
async fn shutdown_stops_the_session() {
    let backend = Backend::new("s1", "s1-next");
    let addr = spawn_backend(backend.clone()).await;
    let runtime =
        SessionRuntime::with_store(&settings_for(&addr), Arc::new(MemorySessionStore::new()))
            .unwrap();

    let _ = runtime.start().await.unwrap();
    await_connected(&runtime).await;

    runtime.shutdown();
    assert_eq!(
        *runtime.connection_status().borrow(),
        ConnectionStatus::Closed
    );

    // No reconnect is ever scheduled after a deliberate teardown.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        *runtime.connection_status().borrow(),
        ConnectionStatus::Closed
    );
}
