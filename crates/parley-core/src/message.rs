//! Chat message records.
//!
//! A [`Message`] is created either on user send or on the first inbound
//! event of a bot reply, and is mutated in place (text, streaming flag) only
//! until the reply completes. The wire shape is camelCase JSON, matching the
//! backend's history payloads.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The human on this client.
    User,
    /// The assistant on the backend.
    Bot,
}

/// A single entry in the conversation timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique within a timeline.
    pub id: MessageId,
    /// Message body. Mutable while the message is streaming.
    pub text: String,
    /// Message author.
    pub sender: Sender,
    /// Creation time, RFC 3339.
    pub timestamp: String,
    /// True while the bot reply may still be patched in place.
    #[serde(default)]
    pub is_streaming: bool,
}

impl Message {
    /// A completed user message, stamped now.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            sender: Sender::User,
            timestamp: Utc::now().to_rfc3339(),
            is_streaming: false,
        }
    }

    /// An empty bot message that is still being streamed.
    #[must_use]
    pub fn bot_streaming(id: MessageId) -> Self {
        Self {
            id,
            text: String::new(),
            sender: Sender::Bot,
            timestamp: Utc::now().to_rfc3339(),
            is_streaming: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
