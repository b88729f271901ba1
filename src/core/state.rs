//! The session aggregate.
//!
//! ## Session
//!
//! One value per session holds everything peers replicate:
//! - Phase, round, turn and active player
//! - The public board
//! - The ordered player list with private zones
//!
//! Uses `im` persistent collections, so cloning a session is O(1). Every
//! state transition is written as `(old, event) -> new` and the old value
//! stays available for diffing.

use im::Vector;
use serde::{Deserialize, Serialize};

use super::board::{Board, CellPos};
use super::entity::CardId;
use super::player::{Player, PlayerId, PrivateZone};
use crate::cards::Card;

/// Session identifier, generated by the Host.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a session id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Game phase, ordinal 0–4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Preparation,
    Setup,
    Main,
    Commit,
    Scoring,
}

impl Phase {
    /// Numeric ordinal of the phase.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Phase for an ordinal, `None` when out of range.
    #[must_use]
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Phase::Preparation),
            1 => Some(Phase::Setup),
            2 => Some(Phase::Main),
            3 => Some(Phase::Commit),
            4 => Some(Phase::Scoring),
            _ => None,
        }
    }
}

/// Where a card currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardLocation {
    /// In one of a player's private zones.
    Zone { player: PlayerId, zone: PrivateZone },
    /// On the board.
    Board(CellPos),
}

/// Replicated session state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub session_id: SessionId,

    /// Player id of the Host.
    pub host_id: PlayerId,

    // === Game Progression ===
    /// Current phase.
    pub phase: Phase,

    /// Round number (starts at 1).
    pub round_number: u32,

    /// Turn number within the session (starts at 1).
    pub turn_number: u32,

    /// Whose turn it is, if the game has started.
    pub active_player: Option<PlayerId>,

    // === Shared State ===
    /// Public board.
    pub board: Board,

    /// Players in join order.
    pub players: Vector<Player>,
}

impl Session {
    /// Create a session hosted by `host`.
    #[must_use]
    pub fn new(session_id: SessionId, host: Player, rows: u8, cols: u8) -> Self {
        let host_id = host.id;
        Self {
            session_id,
            host_id,
            phase: Phase::default(),
            round_number: 1,
            turn_number: 1,
            active_player: None,
            board: Board::new(rows, cols),
            players: Vector::unit(host),
        }
    }

    // === Players ===

    /// Look up a player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Look up a player mutably.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Check whether a player is part of the session.
    #[must_use]
    pub fn contains_player(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// The Host's player entry.
    #[must_use]
    pub fn host(&self) -> Option<&Player> {
        self.player(self.host_id)
    }

    /// Next free player id.
    #[must_use]
    pub fn next_player_id(&self) -> PlayerId {
        let highest = self.players.iter().map(|p| p.id.0).max().unwrap_or(0);
        PlayerId(highest.saturating_add(1))
    }

    /// Append a player.
    pub fn add_player(&mut self, player: Player) {
        self.players.push_back(player);
    }

    /// Iterate player ids in join order.
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().map(|p| p.id)
    }

    /// Number of connected, non-bot players.
    #[must_use]
    pub fn connected_humans(&self) -> usize {
        self.players
            .iter()
            .filter(|p| !p.is_bot && p.is_connected)
            .count()
    }

    // === Cards ===

    /// Find where a card lives.
    #[must_use]
    pub fn locate(&self, id: CardId) -> Option<CardLocation> {
        if let Some(pos) = self.board.find(id) {
            return Some(CardLocation::Board(pos));
        }
        self.players.iter().find_map(|p| {
            p.find_card(id)
                .map(|zone| CardLocation::Zone { player: p.id, zone })
        })
    }

    /// Get a card by id wherever it is.
    #[must_use]
    pub fn card(&self, id: CardId) -> Option<&Card> {
        match self.locate(id)? {
            CardLocation::Board(pos) => self.board.get(pos),
            CardLocation::Zone { player, zone } => self
                .player(player)?
                .zone(zone)
                .iter()
                .find(|c| c.id == id),
        }
    }

    /// Iterate every card id known locally (board and visible zones).
    pub fn card_ids(&self) -> impl Iterator<Item = CardId> + '_ {
        let board = self.board.occupied().map(|(_, c)| c.id);
        let zones = self.players.iter().flat_map(|p| {
            PrivateZone::ALL
                .into_iter()
                .flat_map(move |zone| p.zone(zone).iter().map(|c| c.id))
        });
        board.chain(zones)
    }

    /// Remove every copy of a card from the board and all private zones.
    ///
    /// Returns how many copies were removed.
    pub fn evict_card(&mut self, id: CardId) -> usize {
        let mut removed = 0;
        while let Some(pos) = self.board.find(id) {
            self.board.take(pos);
            removed += 1;
        }
        for player in self.players.iter_mut() {
            for zone in PrivateZone::ALL {
                while player.take_card(zone, id).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    // === Turn Advancement ===

    /// Pass the turn to `next`, bumping the turn counter.
    pub fn advance_turn(&mut self, next: PlayerId) {
        self.turn_number += 1;
        self.active_player = Some(next);
    }

    /// Start the next round at `Phase::Preparation`.
    pub fn advance_round(&mut self) {
        self.round_number += 1;
        self.phase = Phase::Preparation;
    }
}
