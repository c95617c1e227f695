//! JSON wire frames exchanged over the session WebSocket.
//!
//! Frames are text messages externally tagged by a `"type"` field. The tag
//! vocabulary is the backend's event naming (`join:session`,
//! `chat:send:message`, …) and must not change without a backend migration.

use serde::{Deserialize, Serialize};

/// Frames the client sends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Attach this connection to the session's event stream.
    ///
    /// Must be re-sent after every reconnect.
    #[serde(rename = "join:session", rename_all = "camelCase")]
    Join {
        /// The session to attach to.
        session_id: String,
    },

    /// Detach from the session's event stream.
    #[serde(rename = "leave:session", rename_all = "camelCase")]
    Leave {
        /// The session to detach from.
        session_id: String,
    },

    /// A user chat message.
    #[serde(rename = "chat:send:message")]
    Send {
        /// The message body.
        text: String,
    },
}

/// Frames the backend sends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// A complete assistant reply, delivered in one shot.
    #[serde(rename = "chat:message:received", rename_all = "camelCase")]
    Reply {
        /// The full reply text.
        ai_text: String,
        /// Optional source citations.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sources: Option<String>,
    },

    /// A session-scoped error reported by the backend.
    #[serde(rename = "chat:error")]
    Error {
        /// Human-readable description.
        message: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
