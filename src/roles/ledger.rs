//! Apply-at-most-once bookkeeping for received deltas.
//!
//! Numeric deltas are not idempotent, so every `STATE_DELTA` carries the
//! sender's `(epoch, seq)`. The ledger remembers recent sequence numbers per
//! sender and rejects repeats. A new epoch means the sender restarted and
//! its counter began again; frames still in flight from a retired epoch are
//! dropped rather than starting the old counter over.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::net::PeerAddress;

/// How many sequence numbers below the highest one are remembered.
const WINDOW: u64 = 1024;

/// How many retired epochs are remembered per sender.
const RETIRED: usize = 8;

#[derive(Clone, Debug, Default)]
struct SenderLog {
    epoch: u64,
    seen: BTreeSet<u64>,
    retired: SmallVec<[u64; RETIRED]>,
}

impl SenderLog {
    fn floor(&self) -> u64 {
        self.seen.last().map_or(0, |high| high.saturating_sub(WINDOW))
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeltaLedger {
    senders: FxHashMap<PeerAddress, SenderLog>,
}

impl DeltaLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delta. Returns `false` if it was already applied.
    pub fn accept(&mut self, sender: &PeerAddress, epoch: u64, seq: u64) -> bool {
        let log = self.senders.entry(sender.clone()).or_default();
        if log.epoch != epoch {
            if log.retired.contains(&epoch) {
                return false;
            }
            if !log.seen.is_empty() {
                if log.retired.len() == RETIRED {
                    log.retired.remove(0);
                }
                log.retired.push(log.epoch);
            }
            log.epoch = epoch;
            log.seen.clear();
        }
        if !log.seen.is_empty() && seq < log.floor() {
            return false;
        }
        if !log.seen.insert(seq) {
            return false;
        }
        let floor = log.floor();
        log.seen = log.seen.split_off(&floor);
        true
    }

    /// Forget a sender.
    pub fn forget(&mut self, sender: &PeerAddress) {
        self.senders.remove(sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_repeats() {
        let mut ledger = DeltaLedger::new();
        let a = PeerAddress::new("a");
        assert!(ledger.accept(&a, 1, 1));
        assert!(ledger.accept(&a, 1, 2));
        assert!(!ledger.accept(&a, 1, 1));
        assert!(ledger.accept(&PeerAddress::new("b"), 1, 1));
    }

    #[test]
    fn test_out_of_order_accepted_once() {
        let mut ledger = DeltaLedger::new();
        let a = PeerAddress::new("a");
        assert!(ledger.accept(&a, 7, 5));
        assert!(ledger.accept(&a, 7, 3));
        assert!(!ledger.accept(&a, 7, 3));
    }

    #[test]
    fn test_new_epoch_resets() {
        let mut ledger = DeltaLedger::new();
        let a = PeerAddress::new("a");
        assert!(ledger.accept(&a, 1, 1));
        assert!(ledger.accept(&a, 2, 1));
    }

    #[test]
    fn test_late_frame_from_retired_epoch_is_dropped() {
        let mut ledger = DeltaLedger::new();
        let a = PeerAddress::new("a");
        assert!(ledger.accept(&a, 11, 1));
        assert!(ledger.accept(&a, 11, 2));
        assert!(ledger.accept(&a, 42, 1));

        assert!(!ledger.accept(&a, 11, 3));
        assert!(!ledger.accept(&a, 11, 1));
        // The live epoch keeps its history.
        assert!(!ledger.accept(&a, 42, 1));
        assert!(ledger.accept(&a, 42, 2));
    }

    #[test]
    fn test_too_old_is_rejected() {
        let mut ledger = DeltaLedger::new();
        let a = PeerAddress::new("a");
        assert!(ledger.accept(&a, 1, 5_000));
        assert!(!ledger.accept(&a, 1, 10));
    }
}
