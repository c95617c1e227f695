//! Reconnect backoff schedule.
//!
//! Connectivity faults are retried with a delay that doubles per consecutive
//! failure: `2^attempt` seconds for attempt 1, 2, … The run is bounded by a
//! fixed attempt cap; a successful connection resets the run, so backoff is
//! per failure-run, not cumulative across the session lifetime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum reconnect attempts per failure-run.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Default base delay in milliseconds (one second, doubled per attempt).
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Bounded exponential backoff policy for reconnect attempts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Attempt cap; reaching it leaves the connection down for good.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay scaled by `2^attempt`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given 1-based failure attempt, or `None` once the
    /// attempt count reaches the cap (no further attempt is scheduled).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        Some(Duration::from_millis(backoff_delay_ms(
            attempt,
            self.base_delay_ms,
        )))
    }
}

/// `base * 2^attempt`, saturating instead of overflowing.
#[must_use]
pub fn backoff_delay_ms(attempt: u32, base_delay_ms: u64) -> u64 {
    base_delay_ms.saturating_mul(1u64 << attempt.min(31))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
