//! Ordered, mutable log of messages for the active session.
//!
//! The timeline is the sole observable output of the session core. It
//! supports `append` (user sends, reply starts), in-place `patch` of a
//! message's text (streamed replies), and wholesale `replace` (history load,
//! reset). It never reorders: append order is display order.
//!
//! Observers subscribe to a revision counter and take snapshots; each store
//! operation is atomic under the lock.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::ids::MessageId;
use crate::message::Message;

/// Ordered message log with in-place patching for streamed replies.
pub struct Timeline {
    messages: RwLock<Vec<Message>>,
    revision: watch::Sender<u64>,
}

impl Timeline {
    /// An empty timeline at revision zero.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            messages: RwLock::new(Vec::new()),
            revision,
        }
    }

    /// Append a message at the end. Always succeeds.
    pub fn append(&self, message: Message) {
        self.messages.write().push(message);
        self.bump();
    }

    /// Replace the text of the message with the given id; when `completed`,
    /// also clear its streaming flag.
    ///
    /// Unknown ids are a defined no-op: late or duplicate completion events
    /// arrive under reconnect races and must not surface as errors. Returns
    /// whether a message was patched.
    pub fn patch(&self, id: &MessageId, text: &str, completed: bool) -> bool {
        let mut messages = self.messages.write();
        let Some(message) = messages.iter_mut().find(|m| &m.id == id) else {
            debug!(%id, "patch target not in timeline, dropping");
            return false;
        };
        message.text = text.to_owned();
        if completed {
            message.is_streaming = false;
        }
        drop(messages);
        self.bump();
        true
    }

    /// Discard the current timeline and install `messages` verbatim.
    pub fn replace(&self, messages: Vec<Message>) {
        *self.messages.write() = messages;
        self.bump();
    }

    /// A point-in-time copy of the timeline.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Whether the timeline holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Subscribe to the revision counter; it increments on every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
