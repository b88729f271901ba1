//! Card movement between private zones and the board.
//!
//! ## Key Types
//!
//! - `MoveRequest`: Card id, expected owner, source and destination
//! - `MoveOutcome`: Moved, already applied (stale source), or rejected
//! - `ZonePosition`: Insertion point inside an ordered zone

pub mod relocation;

pub use relocation::{relocate, Destination, MoveOutcome, MoveRejection, MoveRequest, ZonePosition};
