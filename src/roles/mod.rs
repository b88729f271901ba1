//! Host/Guest coordination.
//!
//! ## Roles
//!
//! A process starts `Unassigned` and becomes either the Host (created the
//! session, authoritative) or a Guest (joined it). The role is fixed until
//! the process leaves the session.
//!
//! ## Key Types
//!
//! - `SyncCoordinator`: Owns the canonical session and drives all traffic
//! - `ConnectionStatus`: What the UI shows about the link
//! - `SyncEvent`: Notifications for collaborators

pub mod authority;
pub mod coordinator;
pub mod guest;
pub mod host;
pub mod ledger;

use serde::{Deserialize, Serialize};

use crate::core::PlayerId;
use crate::net::{PeerAddress, RejectReason};

pub use authority::{merge_guest_view, sanitize_guest_delta, Sanitized};
pub use coordinator::SyncCoordinator;
pub use ledger::DeltaLedger;

/// Role of this process in its session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Unassigned,
    Host,
    Guest,
}

/// User-visible link status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    #[default]
    Disconnected,
}

/// Notification surfaced through `SyncCoordinator::drain_events`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    /// The canonical session changed.
    StateChanged,
    StatusChanged(ConnectionStatus),
    PlayerJoined(PlayerId),
    PlayerReconnected(PlayerId),
    PlayerDisconnected(PlayerId),
    PlayerLeft(PlayerId),
    JoinRejected(RejectReason),
    /// Guest: the Host is now reachable at a new address.
    HostMoved(PeerAddress),
    /// The session cannot be continued (retry budget exhausted or Host left).
    SessionAbandoned,
}

/// How `resume` treats persisted records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumeMode {
    /// Continue the newest session younger than the retention window.
    Resume,
    /// Discard persisted sessions.
    FreshJoin,
}
