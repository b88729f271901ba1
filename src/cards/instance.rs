//! Card instances - runtime card state.
//!
//! `Card` is one physical card in a session. Its `id` never changes; it
//! moves between hand, deck, discard and board by relocation, never by copy.
//!
//! ## Statuses
//!
//! Statuses form an ordered multiset. The same kind may be applied several
//! times by different players; removing a kind removes the most recently
//! applied entry.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::definition::DefinitionId;
use crate::core::entity::CardId;
use crate::core::player::PlayerId;

/// Kind of a status effect. Games define the vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusKind(pub String);

impl StatusKind {
    /// Create a status kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }
}

impl From<&str> for StatusKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One applied status.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub added_by: PlayerId,
}

/// A card instance in a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    /// Stable instance id.
    pub id: CardId,

    /// Reference into the content catalog.
    pub definition_id: DefinitionId,

    /// Player who owns the card.
    pub owner_id: PlayerId,

    /// Power from the definition, filled in when the card is rehydrated.
    pub base_power: i32,

    /// Mutable power adjustment.
    pub power_modifier: i32,

    /// Is this card face-down?
    pub is_face_down: bool,

    /// Applied statuses, oldest first.
    /// SmallVec keeps the common 0-2 statuses inline.
    pub statuses: SmallVec<[Status; 2]>,
}

impl Card {
    /// Create a face-up card with no modifiers.
    #[must_use]
    pub fn new(id: CardId, definition_id: DefinitionId, owner_id: PlayerId) -> Self {
        Self {
            id,
            definition_id,
            owner_id,
            base_power: 0,
            power_modifier: 0,
            is_face_down: false,
            statuses: SmallVec::new(),
        }
    }

    /// Set base power (builder pattern).
    #[must_use]
    pub fn with_base_power(mut self, power: i32) -> Self {
        self.base_power = power;
        self
    }

    /// Effective power.
    #[must_use]
    pub fn power(&self) -> i32 {
        self.base_power + self.power_modifier
    }

    /// Apply a status.
    pub fn add_status(&mut self, kind: impl Into<StatusKind>, added_by: PlayerId) {
        self.statuses.push(Status {
            kind: kind.into(),
            added_by,
        });
    }

    /// Remove the most recently applied status of a kind.
    ///
    /// Returns the removed entry, or `None` if the card has no such status.
    pub fn remove_status(&mut self, kind: &StatusKind) -> Option<Status> {
        let pos = self.statuses.iter().rposition(|s| &s.kind == kind)?;
        Some(self.statuses.remove(pos))
    }

    /// Check if a status kind is present.
    #[must_use]
    pub fn has_status(&self, kind: &StatusKind) -> bool {
        self.statuses.iter().any(|s| &s.kind == kind)
    }
}
