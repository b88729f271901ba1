//! # ccg-sync
//!
//! Replicated game-state synchronization for host/guest multiplayer card
//! games.
//!
//! ## Design Principles
//!
//! 1. **One Canonical State**: Each process holds exactly one `Session`,
//!    owned by its `SyncCoordinator`. Every change is a pure
//!    `(old, event) -> new` transition.
//!
//! 2. **Sans-IO**: The engine never reads a clock and never touches a
//!    socket. Callers pass `now` into every entry point, feed received
//!    frames to `handle_frame` and ship what `poll` returns through any
//!    `Transport`.
//!
//! 3. **Host Authority**: The creating process is authoritative for
//!    scores, decks and discard piles. Guests apply changes optimistically
//!    and accept corrective updates.
//!
//! ## Architecture
//!
//! - **Sparse Deltas**: Peers exchange `StateDelta`s. Board changes are
//!   absolute and idempotent; numeric changes are de-duplicated per sender
//!   by `(epoch, seq)`.
//!
//! - **Privacy Projection**: Private zones of other humans only ever travel
//!   as counters. Bots' cards are public.
//!
//! - **Persistent Data Structures**: O(1) cloning of whole sessions via
//!   `im-rs`, so diffing against the last synced state is cheap.
//!
//! ## Modules
//!
//! - `core`: Ids, players, board, session, configuration, time
//! - `cards`: Card definitions, instances and the catalog
//! - `zones`: Card relocation with stale-move detection
//! - `delta`: Diff and apply
//! - `privacy`: Per-recipient projection and compact cards
//! - `net`: Wire messages, envelopes, transports
//! - `roles`: The Host/Guest coordinator
//! - `persistence`: Session records, discovery, reconnection
//! - `batch`: Debounced score adjustments
//! - `runtime`: Deferred task scheduling

pub mod core;
pub mod cards;
pub mod zones;
pub mod delta;
pub mod privacy;
pub mod net;
pub mod roles;
pub mod persistence;
pub mod batch;
pub mod runtime;
pub mod error;

// Re-export commonly used types
pub use crate::core::{
    CardId, CardIdAllocator,
    Player, PlayerId, PrivateZone, ZoneSizes,
    Board, CellPos,
    Phase, Session, SessionId,
    SyncConfig, Timestamp,
};

pub use crate::cards::{Card, CardCatalog, CardDefinition, DefinitionId};

pub use crate::zones::{relocate, Destination, MoveOutcome, MoveRejection, MoveRequest, ZonePosition};

pub use crate::delta::{apply, diff, ApplyContext, StateDelta, Viewer};

pub use crate::privacy::{project, CompactCard, Encoding, PublicView, Recipient, ReconnectSnapshot};

pub use crate::net::{Envelope, MemoryNetwork, Message, Outbound, PeerAddress, Transport};

pub use crate::roles::{ConnectionStatus, ResumeMode, Role, SyncCoordinator, SyncEvent};

pub use crate::persistence::{FileStore, MemoryStore, SessionStore};

pub use crate::error::{Result, SyncError, TransportError};
