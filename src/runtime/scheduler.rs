//! Timer queue for deferred and periodic work.
//!
//! Every delayed action of the coordinator is a `Task` with a due time.
//! The embedding runtime calls `poll(now)`, which pops and runs whatever is
//! due; there are no hidden timers.
//!
//! ## Example
//!
//! ```
//! use ccg_sync::core::Timestamp;
//! use ccg_sync::runtime::{Scheduler, Task};
//!
//! let mut scheduler = Scheduler::new();
//! scheduler.schedule(Timestamp(500), Task::FlushBatch);
//! scheduler.schedule(Timestamp(0), Task::FlushOutbox);
//!
//! assert_eq!(scheduler.pop_due(Timestamp(0)), Some(Task::FlushOutbox));
//! assert_eq!(scheduler.pop_due(Timestamp(0)), None);
//! assert_eq!(scheduler.pop_due(Timestamp(500)), Some(Task::FlushBatch));
//! ```

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::core::Timestamp;

/// Deferred work item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    /// Diff the local state and queue deltas (zero-delay send).
    FlushOutbox,
    /// Send batched score adjustments that are due.
    FlushBatch,
    /// Host: publish the transport address.
    AnnounceAddress,
    /// Guest: read the discovery record when the store cannot push.
    PollDiscovery,
    /// Guest: next reconnect attempt.
    ReconnectAttempt,
    /// Host: periodic persistence.
    PersistSnapshot,
}

/// Min-heap of tasks with at most one live entry per task.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<(Timestamp, u64, Task)>>,
    live: FxHashMap<Task, (Timestamp, u64)>,
    next_seq: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` at `at`.
    ///
    /// If the task is already pending, the earlier of the two times wins.
    pub fn schedule(&mut self, at: Timestamp, task: Task) {
        if let Some(&(pending_at, _)) = self.live.get(&task) {
            if pending_at <= at {
                return;
            }
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(task, (at, seq));
        self.heap.push(Reverse((at, seq, task)));
    }

    /// Drop a pending task.
    pub fn cancel(&mut self, task: Task) {
        self.live.remove(&task);
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.live.clear();
        self.heap.clear();
    }

    /// Whether `task` is pending.
    #[must_use]
    pub fn is_scheduled(&self, task: Task) -> bool {
        self.live.contains_key(&task)
    }

    /// Due time of `task`, if pending.
    #[must_use]
    pub fn due_at(&self, task: Task) -> Option<Timestamp> {
        self.live.get(&task).map(|&(at, _)| at)
    }

    /// Earliest pending due time.
    #[must_use]
    pub fn next_due(&self) -> Option<Timestamp> {
        self.live.values().map(|&(at, _)| at).min()
    }

    /// Pop the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<Task> {
        while let Some(Reverse((at, seq, task))) = self.heap.peek().copied() {
            if at > now {
                return None;
            }
            self.heap.pop();
            // Entries superseded by a reschedule or cancel are stale.
            if self.live.get(&task) == Some(&(at, seq)) {
                self.live.remove(&task);
                return Some(task);
            }
        }
        None
    }
}
