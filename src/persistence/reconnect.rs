//! Bounded-retry reconnection state machine.
//!
//! ```text
//! Active -> Disconnected -> Reconnecting -> Active
//!                                        -> Abandoned
//! ```
//!
//! Attempts are spaced by `interval`; once `max_wait` has passed since the
//! link was lost the manager gives up for good.

use std::time::Duration;

use crate::core::Timestamp;

/// Link state towards the counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Active,
    Disconnected { since: Timestamp },
    Reconnecting { since: Timestamp, attempts: u32 },
    Abandoned,
}

/// What the caller should do after a tick of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptDecision {
    /// Send a reconnect request now, then wait until `next`.
    Attempt { attempt: u32, next: Timestamp },
    /// Retry budget exhausted.
    GiveUp,
    /// Not reconnecting.
    Idle,
}

#[derive(Clone, Debug)]
pub struct ReconnectManager {
    state: LinkState,
    interval: Duration,
    max_wait: Duration,
}

impl ReconnectManager {
    #[must_use]
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self {
            state: LinkState::Active,
            interval,
            max_wait,
        }
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether a reconnect is in progress.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, LinkState::Disconnected { .. } | LinkState::Reconnecting { .. })
    }

    /// Record that the link dropped. Keeps the original loss time if the
    /// link was already down.
    pub fn link_lost(&mut self, now: Timestamp) {
        if !self.is_pending() {
            self.state = LinkState::Disconnected { since: now };
        }
    }

    /// Advance at a scheduled attempt time.
    pub fn on_attempt(&mut self, now: Timestamp) -> AttemptDecision {
        let (since, attempts) = match self.state {
            LinkState::Disconnected { since } => (since, 0),
            LinkState::Reconnecting { since, attempts } => (since, attempts),
            LinkState::Active | LinkState::Abandoned => return AttemptDecision::Idle,
        };
        if now.since(since) >= self.max_wait {
            self.state = LinkState::Abandoned;
            return AttemptDecision::GiveUp;
        }
        let attempt = attempts + 1;
        self.state = LinkState::Reconnecting { since, attempts: attempt };
        AttemptDecision::Attempt {
            attempt,
            next: now.after(self.interval),
        }
    }

    /// The handshake completed.
    pub fn succeeded(&mut self) {
        self.state = LinkState::Active;
    }

    /// Stop retrying without reaching `Abandoned` (explicit exit).
    pub fn cancel(&mut self) {
        self.state = LinkState::Active;
    }
}
