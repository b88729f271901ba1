//! Privacy projection: what each peer may see.
//!
//! ## Key Types
//!
//! - `CompactCard`: Per-instance card fields, catalog data stripped
//! - `PublicView`: A session as one recipient sees it
//! - `ReconnectSnapshot`: Compact view used to resume a Guest
//!
//! Private contents of a non-bot player are never placed in a message
//! addressed to anyone but that player.

pub mod compact;
pub mod projector;
pub mod snapshot;

pub use compact::{compact_all, reconstruct, reconstruct_all, CompactCard};
pub use projector::{
    project, tailor_delta, BoardCards, BoardView, Encoding, Placeholder, PlacedCompactCard, PlayerView, PublicView,
    Recipient, ZoneView,
};
pub use snapshot::{OwnCards, ReconnectSnapshot};
