//! Error type shared by every module.
//!
//! Most data-level problems (stale references, unknown players, authority
//! conflicts) are absorbed where they happen and only logged. `SyncError`
//! covers what a caller can act on: codec and storage failures, role misuse,
//! and frames that cannot fit the transport.

use thiserror::Error;

use crate::cards::DefinitionId;
use crate::core::PlayerId;
use crate::net::PeerAddress;
use crate::roles::Role;

/// Errors surfaced by the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Wire message could not be encoded or decoded.
    #[error("wire codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Persisted record could not be encoded or decoded.
    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] bincode::Error),

    /// Durable storage failed.
    #[error("session store I/O error: {0}")]
    Store(#[from] std::io::Error),

    /// The transport refused a frame.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A role was already assigned for this process.
    #[error("role already assigned: {current:?}")]
    RoleAlreadyAssigned { current: Role },

    /// The operation requires a different role.
    #[error("operation requires role {expected:?}, process is {actual:?}")]
    WrongRole { expected: Role, actual: Role },

    /// No session is loaded.
    #[error("no active session")]
    NoSession,

    /// The session already has `max` players.
    #[error("session is full ({max} players)")]
    SessionFull { max: usize },

    /// A player id is not part of the session.
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// A compact card references a definition missing from the catalog.
    #[error("unknown card definition {0}")]
    UnknownDefinition(DefinitionId),

    /// Even the compact encoding of a frame exceeds the payload limit.
    #[error("frame of {size} bytes exceeds transport limit of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Failures reported by a `Transport` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No link to the address exists (never connected, or dropped).
    #[error("peer {0} is unreachable")]
    Unreachable(PeerAddress),

    /// The frame is larger than the link accepts.
    #[error("frame of {size} bytes exceeds link limit of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
