//! Card instance identification.
//!
//! Every card instance in a session has a `CardId` that never changes while
//! the card exists. Host and Guests both spawn cards, so ids are minted
//! without coordination: the issuing player's id plus a serial that only
//! that process increments.
//!
//! ## Usage
//!
//! ```
//! use ccg_sync::core::{CardId, CardIdAllocator, PlayerId};
//!
//! let mut alloc = CardIdAllocator::new(PlayerId::new(2));
//!
//! let a = alloc.next_id();
//! let b = alloc.next_id();
//!
//! assert_ne!(a, b);
//! assert_eq!(a.origin, PlayerId::new(2));
//! assert_eq!(format!("{}", CardId::new(PlayerId::new(1), 123)), "C1-123");
//! ```

use serde::{Deserialize, Serialize};

use super::player::PlayerId;

/// Globally unique identifier of a card instance.
///
/// This is the only safe join key between Host and Guest views. Positions
/// inside a zone shift as cards move; ids do not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId {
    /// Player whose process minted the id.
    pub origin: PlayerId,

    /// Per-origin serial number.
    pub serial: u32,
}

impl CardId {
    /// Create a card id.
    #[must_use]
    pub const fn new(origin: PlayerId, serial: u32) -> Self {
        Self { origin, serial }
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}-{}", self.origin.0, self.serial)
    }
}

/// Mints `CardId`s for one process.
///
/// The allocator is restored from persisted state on resume, so serials
/// continue where they stopped instead of restarting at zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardIdAllocator {
    origin: PlayerId,
    next_serial: u32,
}

impl CardIdAllocator {
    /// Create an allocator for cards spawned by `origin`.
    #[must_use]
    pub const fn new(origin: PlayerId) -> Self {
        Self {
            origin,
            next_serial: 1,
        }
    }

    /// Continue after the highest serial already used by `origin`.
    #[must_use]
    pub fn resume_after(origin: PlayerId, used: impl IntoIterator<Item = CardId>) -> Self {
        let highest = used
            .into_iter()
            .filter(|id| id.origin == origin)
            .map(|id| id.serial)
            .max()
            .unwrap_or(0);
        Self {
            origin,
            next_serial: highest + 1,
        }
    }

    /// Player whose ids this allocator mints.
    #[must_use]
    pub const fn origin(&self) -> PlayerId {
        self.origin
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> CardId {
        let id = CardId::new(self.origin, self.next_serial);
        self.next_serial += 1;
        id
    }
}
