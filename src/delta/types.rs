//! Sparse state deltas.
//!
//! A `StateDelta` only mentions what changed. Absent fields are true no-ops,
//! never zeros, so deltas from different senders compose: board cells are
//! replaced wholesale (last writer wins per cell) and numeric fields are
//! signed adjustments that sum.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::core::{CellPos, Phase, PlayerId, PrivateZone};
use crate::privacy::CompactCard;

/// New content of one board cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange {
    pub row: u8,
    pub col: u8,
    /// `None` empties the cell.
    pub card: Option<Card>,
}

impl CellChange {
    /// Create a cell change.
    #[must_use]
    pub fn new(pos: CellPos, card: Option<Card>) -> Self {
        Self {
            row: pos.row,
            col: pos.col,
            card,
        }
    }

    /// Coordinate of the cell.
    #[must_use]
    pub fn pos(&self) -> CellPos {
        CellPos::new(self.row, self.col)
    }
}

/// Changes to one player's public fields and, for permitted recipients,
/// private zone contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_size_delta: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck_size_delta: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard_size_delta: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_connected: Option<bool>,
    /// Full replacement of the hand, present only when the hand changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<CompactCard>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck: Option<Vec<CompactCard>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard: Option<Vec<CompactCard>>,
}

impl PlayerDelta {
    /// True when no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Signed size change of a zone.
    #[must_use]
    pub fn size_delta(&self, zone: PrivateZone) -> Option<i32> {
        match zone {
            PrivateZone::Hand => self.hand_size_delta,
            PrivateZone::Deck => self.deck_size_delta,
            PrivateZone::Discard => self.discard_size_delta,
        }
    }

    /// Set the size change of a zone.
    pub fn set_size_delta(&mut self, zone: PrivateZone, delta: Option<i32>) {
        match zone {
            PrivateZone::Hand => self.hand_size_delta = delta,
            PrivateZone::Deck => self.deck_size_delta = delta,
            PrivateZone::Discard => self.discard_size_delta = delta,
        }
    }

    /// Replacement contents of a zone.
    #[must_use]
    pub fn contents(&self, zone: PrivateZone) -> Option<&[CompactCard]> {
        match zone {
            PrivateZone::Hand => self.hand.as_deref(),
            PrivateZone::Deck => self.deck.as_deref(),
            PrivateZone::Discard => self.discard.as_deref(),
        }
    }

    /// Set the replacement contents of a zone.
    pub fn set_contents(&mut self, zone: PrivateZone, cards: Option<Vec<CompactCard>>) {
        match zone {
            PrivateZone::Hand => self.hand = cards,
            PrivateZone::Deck => self.deck = cards,
            PrivateZone::Discard => self.discard = cards,
        }
    }

    /// Drop every zone's contents, keeping the counters.
    pub fn strip_contents(&mut self) {
        self.hand = None;
        self.deck = None;
        self.discard = None;
    }

    /// Add another delta for the same player on top of this one.
    ///
    /// Numeric fields sum; flags and contents take the later value.
    pub fn merge(&mut self, later: PlayerDelta) {
        fn sum<T: std::ops::Add<Output = T>>(a: Option<T>, b: Option<T>) -> Option<T> {
            match (a, b) {
                (Some(x), Some(y)) => Some(x + y),
                (x, None) => x,
                (None, y) => y,
            }
        }
        self.score_delta = sum(self.score_delta, later.score_delta);
        self.hand_size_delta = sum(self.hand_size_delta, later.hand_size_delta);
        self.deck_size_delta = sum(self.deck_size_delta, later.deck_size_delta);
        self.discard_size_delta = sum(self.discard_size_delta, later.discard_size_delta);
        self.is_connected = later.is_connected.or(self.is_connected);
        self.hand = later.hand.or(self.hand.take());
        self.deck = later.deck.or(self.deck.take());
        self.discard = later.discard.or(self.discard.take());
    }
}

/// A sparse, independently appliable bundle of changes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_player: Option<PlayerId>,
    /// Set when the active player went away. Ignored if `active_player` is present.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clear_active_player: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_cells: Option<Vec<CellChange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_deltas: Option<BTreeMap<PlayerId, PlayerDelta>>,
}

impl StateDelta {
    /// True iff every optional field is absent.
    ///
    /// Used to suppress empty network sends.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phase.is_none()
            && self.round.is_none()
            && self.turn.is_none()
            && self.active_player.is_none()
            && !self.clear_active_player
            && self.board_cells.is_none()
            && self.player_deltas.is_none()
    }

    /// True when the delta changes turn structure (phase, round, turn, active player).
    ///
    /// Such deltas force pending batches out first.
    #[must_use]
    pub fn is_turn_structural(&self) -> bool {
        self.phase.is_some()
            || self.round.is_some()
            || self.turn.is_some()
            || self.active_player.is_some()
            || self.clear_active_player
    }

    /// Delta for one player, if present.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&PlayerDelta> {
        self.player_deltas.as_ref()?.get(&id)
    }

    /// Add a player delta, merging with any existing entry for that player.
    pub fn push_player(&mut self, id: PlayerId, delta: PlayerDelta) {
        if delta.is_empty() {
            return;
        }
        let map = self.player_deltas.get_or_insert_with(BTreeMap::new);
        match map.get_mut(&id) {
            Some(existing) => existing.merge(delta),
            None => {
                map.insert(id, delta);
            }
        }
    }

    /// Add a board cell change.
    pub fn push_cell(&mut self, change: CellChange) {
        self.board_cells.get_or_insert_with(Vec::new).push(change);
    }

    /// Remove player entries that became empty and collapse empty collections.
    pub fn normalize(&mut self) {
        if let Some(map) = self.player_deltas.as_mut() {
            map.retain(|_, d| !d.is_empty());
        }
        if self.player_deltas.as_ref().is_some_and(BTreeMap::is_empty) {
            self.player_deltas = None;
        }
        if self.board_cells.as_ref().is_some_and(Vec::is_empty) {
            self.board_cells = None;
        }
        if self.active_player.is_some() {
            self.clear_active_player = false;
        }
    }

    /// Fold a later delta into this one.
    ///
    /// Scalars take the later value, cell changes are appended and player
    /// deltas merge.
    pub fn absorb(&mut self, later: StateDelta) {
        self.phase = later.phase.or(self.phase);
        self.round = later.round.or(self.round);
        self.turn = later.turn.or(self.turn);
        if later.active_player.is_some() || later.clear_active_player {
            self.active_player = later.active_player;
            self.clear_active_player = later.active_player.is_none();
        }
        for change in later.board_cells.into_iter().flatten() {
            self.push_cell(change);
        }
        for (id, delta) in later.player_deltas.into_iter().flatten() {
            self.push_player(id, delta);
        }
    }

    /// Split off all score deltas, leaving the rest in `self`.
    ///
    /// Returns `(player, score_delta)` pairs for the batcher.
    pub fn take_scores(&mut self) -> Vec<(PlayerId, i64)> {
        let mut scores = Vec::new();
        if let Some(map) = self.player_deltas.as_mut() {
            for (id, delta) in map.iter_mut() {
                if let Some(score) = delta.score_delta.take() {
                    scores.push((*id, score));
                }
            }
        }
        self.normalize();
        scores
    }
}
