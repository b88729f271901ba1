//! Debounced summing of rapid same-field deltas.
//!
//! Score taps arrive in bursts. Instead of one frame per tap, adjustments
//! for the same `(player, field)` are summed until `window` has passed
//! since the first one, then sent as a single delta.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{PlayerId, Timestamp};
use crate::delta::{PlayerDelta, StateDelta};

/// A numeric field the batcher may coalesce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BatchField {
    Score,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Pending {
    sum: i64,
    first_at: Timestamp,
}

/// Per-`(player, field)` accumulator.
#[derive(Clone, Debug)]
pub struct MutationBatcher {
    window: Duration,
    pending: BTreeMap<(PlayerId, BatchField), Pending>,
}

impl MutationBatcher {
    /// Create a batcher with the given debounce window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
        }
    }

    /// Add an adjustment.
    ///
    /// Returns the time at which the key's batch becomes due.
    pub fn push(&mut self, now: Timestamp, player: PlayerId, field: BatchField, amount: i64) -> Timestamp {
        let entry = self
            .pending
            .entry((player, field))
            .or_insert(Pending { sum: 0, first_at: now });
        entry.sum += amount;
        entry.first_at.after(self.window)
    }

    /// Earliest time any batch becomes due.
    #[must_use]
    pub fn next_due(&self) -> Option<Timestamp> {
        self.pending.values().map(|p| p.first_at.after(self.window)).min()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Everything pending, without removing it.
    #[must_use]
    pub fn pending(&self) -> StateDelta {
        let mut delta = StateDelta::default();
        for (key, pending) in &self.pending {
            push_field(&mut delta, *key, pending.sum);
        }
        delta
    }

    /// Emit every batch whose window has elapsed.
    pub fn flush_due(&mut self, now: Timestamp) -> StateDelta {
        let window = self.window;
        let due: Vec<_> = self
            .pending
            .iter()
            .filter(|(_, p)| p.first_at.after(window) <= now)
            .map(|(key, _)| *key)
            .collect();
        let mut delta = StateDelta::default();
        for key in due {
            if let Some(pending) = self.pending.remove(&key) {
                push_field(&mut delta, key, pending.sum);
            }
        }
        delta
    }

    /// Emit everything, regardless of windows.
    pub fn flush_all(&mut self) -> StateDelta {
        let mut delta = StateDelta::default();
        for (key, pending) in std::mem::take(&mut self.pending) {
            push_field(&mut delta, key, pending.sum);
        }
        delta
    }
}

fn push_field(delta: &mut StateDelta, (player, field): (PlayerId, BatchField), sum: i64) {
    // Adjustments that cancel out are not worth a frame.
    if sum == 0 {
        return;
    }
    let player_delta = match field {
        BatchField::Score => PlayerDelta {
            score_delta: Some(sum),
            ..Default::default()
        },
    };
    delta.push_player(player, player_delta);
}
