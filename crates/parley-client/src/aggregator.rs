//! Folds inbound assistant replies into the timeline.
//!
//! The backend delivers each reply complete, in one event. The aggregator
//! still performs the two-step start-then-complete sequence — append a
//! streaming bot message, then immediately patch it complete — so a
//! presentation layer can animate the arrival. Only one aggregation is ever
//! open per session.

use std::sync::Arc;

use tracing::debug;

use parley_core::{Message, MessageId, Timeline};

/// Turns inbound reply events into timeline mutations.
pub struct StreamingAggregator {
    timeline: Arc<Timeline>,
}

impl StreamingAggregator {
    /// Aggregator writing into the given timeline.
    #[must_use]
    pub fn new(timeline: Arc<Timeline>) -> Self {
        Self { timeline }
    }

    /// Handle one complete assistant reply.
    ///
    /// Synthesizes a message id, appends the bot message as streaming, then
    /// patches it complete with the full text. Returns the id of the new
    /// message.
    pub fn handle_reply(&self, text: &str, sources: Option<&str>) -> MessageId {
        if let Some(sources) = sources {
            // Citations are not part of the timeline; surfaced for debugging only.
            debug!(sources, "reply carried sources");
        }
        let id = MessageId::new();
        self.timeline.append(Message::bot_streaming(id.clone()));
        let _ = self.timeline.patch(&id, text, true);
        id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
