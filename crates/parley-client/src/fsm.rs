//! Connection lifecycle state machine.
//!
//! Pure, synchronous state and transition logic, kept separate from the
//! async driver so the lifecycle invariants are checkable without a runtime:
//! only one failure-run counter, `Closed` is terminal, and peer close and
//! transport error are the same connectivity fault.

use std::time::Duration;

use parley_core::retry::ReconnectPolicy;

/// Lifecycle states of the session transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport. Reached initially, between reconnect attempts, and
    /// permanently once the attempt budget is exhausted.
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// The transport is open.
    Connected,
    /// Explicit teardown. Terminal: never re-entered into `Connecting`.
    Closed,
}

/// Outcome of a connectivity interruption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// Schedule a reconnect attempt after the given delay.
    Retry {
        /// 1-based failure attempt within the current run.
        attempt: u32,
        /// Backoff delay before redialing.
        delay: Duration,
    },
    /// The attempt budget is exhausted; stay disconnected for good.
    GiveUp,
    /// The machine was closed or already disconnected; nothing to do.
    Ignore,
}

/// Finite state machine for the session connection.
#[derive(Debug)]
pub struct ConnectionFsm {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ConnectionFsm {
    /// A fresh machine in `Disconnected` with a zeroed failure run.
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            policy,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Failures in the current run.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Whether the machine has been explicitly torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// `Disconnected → Connecting`. Returns false in any other state, in
    /// particular from `Closed` (terminal).
    pub fn begin_connect(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            self.state = ConnectionState::Connecting;
            true
        } else {
            false
        }
    }

    /// Transport open: `Connecting → Connected`, resetting the failure run.
    pub fn on_open(&mut self) -> bool {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            self.attempts = 0;
            true
        } else {
            false
        }
    }

    /// Connectivity fault: peer close and transport error are treated
    /// uniformly. From `Connected` or `Connecting` the machine drops to
    /// `Disconnected` and either schedules a retry or gives up.
    pub fn on_interrupt(&mut self) -> InterruptOutcome {
        match self.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                self.state = ConnectionState::Disconnected;
                self.attempts += 1;
                match self.policy.delay_for(self.attempts) {
                    Some(delay) => InterruptOutcome::Retry {
                        attempt: self.attempts,
                        delay,
                    },
                    None => InterruptOutcome::GiveUp,
                }
            }
            ConnectionState::Disconnected | ConnectionState::Closed => InterruptOutcome::Ignore,
        }
    }

    /// Explicit teardown: any state `→ Closed`.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            base_delay_ms: 1000,
        }
    }

    #[test]
    fn starts_disconnected() {
        let fsm = ConnectionFsm::new(ReconnectPolicy::default());
        assert_eq!(fsm.state(), ConnectionState::Disconnected);
        assert_eq!(fsm.attempts(), 0);
    }

    #[test]
    fn connect_open_reaches_connected() {
        let mut fsm = ConnectionFsm::new(ReconnectPolicy::default());
        assert!(fsm.begin_connect());
        assert_eq!(fsm.state(), ConnectionState::Connecting);
        assert!(fsm.on_open());
        assert!(fsm.is_connected());
    }

    #[test]
    fn begin_connect_rejected_while_connecting_or_connected() {
        let mut fsm = ConnectionFsm::new(ReconnectPolicy::default());
        assert!(fsm.begin_connect());
        assert!(!fsm.begin_connect());
        assert!(fsm.on_open());
        assert!(!fsm.begin_connect());
    }

    #[test]
    fn open_out_of_order_is_rejected() {
        let mut fsm = ConnectionFsm::new(ReconnectPolicy::default());
        assert!(!fsm.on_open());
        assert_eq!(fsm.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn interrupt_schedules_doubling_delays() {
        let mut fsm = ConnectionFsm::new(fast_policy(5));
        let mut delays = Vec::new();
        for _ in 0..4 {
            assert!(fsm.begin_connect());
            let outcome = fsm.on_interrupt();
            let InterruptOutcome::Retry { delay, .. } = outcome else {
                panic!("expected retry, got {outcome:?}");
            };
            delays.push(delay);
        }
        assert_eq!(
            delays,
            [
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
            ]
        );
    }

    #[test]
    fn gives_up_at_the_attempt_cap() {
        let mut fsm = ConnectionFsm::new(fast_policy(3));
        for _ in 0..2 {
            assert!(fsm.begin_connect());
            assert!(matches!(
                fsm.on_interrupt(),
                InterruptOutcome::Retry { .. }
            ));
        }
        assert!(fsm.begin_connect());
        assert_eq!(fsm.on_interrupt(), InterruptOutcome::GiveUp);
        // Permanently disconnected: later faults change nothing.
        assert_eq!(fsm.state(), ConnectionState::Disconnected);
        assert_eq!(fsm.on_interrupt(), InterruptOutcome::Ignore);
    }

    #[test]
    fn successful_open_resets_the_failure_run() {
        let mut fsm = ConnectionFsm::new(fast_policy(5));
        assert!(fsm.begin_connect());
        assert!(matches!(fsm.on_interrupt(), InterruptOutcome::Retry { attempt: 1, .. }));
        assert!(fsm.begin_connect());
        assert!(fsm.on_open());
        assert_eq!(fsm.attempts(), 0);

        // The next failure-run starts from the first delay again.
        let outcome = fsm.on_interrupt();
        assert!(matches!(outcome, InterruptOutcome::Retry { attempt: 1, .. }));
    }

    #[test]
    fn close_is_terminal() {
        let mut fsm = ConnectionFsm::new(ReconnectPolicy::default());
        assert!(fsm.begin_connect());
        assert!(fsm.on_open());
        fsm.close();
        assert!(fsm.is_closed());
        assert!(!fsm.begin_connect());
        assert!(!fsm.on_open());
        assert_eq!(fsm.on_interrupt(), InterruptOutcome::Ignore);
        assert!(fsm.is_closed());
    }

    #[test]
    fn interrupt_while_connecting_counts_as_a_fault() {
        // A failed dial is the same connectivity fault as a dropped link.
        let mut fsm = ConnectionFsm::new(fast_policy(5));
        assert!(fsm.begin_connect());
        let outcome = fsm.on_interrupt();
        assert!(matches!(outcome, InterruptOutcome::Retry { attempt: 1, .. }));
        assert_eq!(fsm.state(), ConnectionState::Disconnected);
    }
}
