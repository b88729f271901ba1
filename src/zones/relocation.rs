//! Card relocation between zones and the board.
//!
//! A move is one step: the card leaves its source and arrives at its
//! destination in the same state transition, so no intermediate state ever
//! holds two copies. Before anything is removed the source is checked to
//! still hold the expected card id with the expected owner. When it does
//! not, another message already moved the card and the request is reported
//! as `AlreadyApplied` instead of being retried.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{CardId, CardLocation, CellPos, PlayerId, PrivateZone, Session};

/// Position for inserting a card into a private zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZonePosition {
    /// Add to top of zone (end of the sequence).
    Top,
    /// Add to bottom of zone.
    Bottom,
    /// Insert at specific index (0 = bottom), clamped to the zone length.
    Index(usize),
}

/// Where a moved card should end up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Zone {
        player: PlayerId,
        zone: PrivateZone,
        position: ZonePosition,
    },
    Board(CellPos),
}

/// A request to move one card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Card expected at the source.
    pub card_id: CardId,

    /// Owner expected on that card.
    pub owner_id: PlayerId,

    /// Where the mover believes the card currently is.
    pub from: CardLocation,

    /// Where the card goes.
    pub to: Destination,
}

/// Why a move was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveRejection {
    /// Destination board cell holds another card.
    Occupied(CellPos),
    /// Destination board cell is off the board.
    OutOfRange(CellPos),
    /// Destination player is not in the session.
    UnknownPlayer(PlayerId),
}

/// Result of a relocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The card moved.
    Moved,
    /// The source no longer holds the expected card; nothing changed.
    AlreadyApplied,
    /// The destination cannot take the card; nothing changed.
    Rejected(MoveRejection),
}

impl MoveRequest {
    /// Move a card from a private zone onto the board.
    #[must_use]
    pub fn zone_to_board(card_id: CardId, owner_id: PlayerId, zone: PrivateZone, to: CellPos) -> Self {
        Self {
            card_id,
            owner_id,
            from: CardLocation::Zone { player: owner_id, zone },
            to: Destination::Board(to),
        }
    }

    /// Move a card between two board cells.
    #[must_use]
    pub fn board_to_board(card_id: CardId, owner_id: PlayerId, from: CellPos, to: CellPos) -> Self {
        Self {
            card_id,
            owner_id,
            from: CardLocation::Board(from),
            to: Destination::Board(to),
        }
    }
}

fn source_matches(session: &Session, req: &MoveRequest) -> bool {
    let matches = |c: &crate::cards::Card| c.id == req.card_id && c.owner_id == req.owner_id;
    match req.from {
        CardLocation::Board(pos) => session.board.get(pos).is_some_and(matches),
        CardLocation::Zone { player, zone } => session
            .player(player)
            .is_some_and(|p| p.zone(zone).iter().any(matches)),
    }
}

fn check_destination(session: &Session, req: &MoveRequest) -> Option<MoveRejection> {
    match req.to {
        Destination::Board(pos) => {
            if !session.board.contains(pos) {
                return Some(MoveRejection::OutOfRange(pos));
            }
            match session.board.get(pos) {
                Some(other) if other.id != req.card_id => Some(MoveRejection::Occupied(pos)),
                _ => None,
            }
        }
        Destination::Zone { player, .. } => (!session.contains_player(player))
            .then_some(MoveRejection::UnknownPlayer(player)),
    }
}

/// Move a card in place.
///
/// ## Example
///
/// ```
/// use ccg_sync::cards::{Card, DefinitionId};
/// use ccg_sync::core::{CardId, CellPos, Player, PlayerId, PrivateZone, Session, SessionId};
/// use ccg_sync::zones::{relocate, MoveOutcome, MoveRequest};
///
/// let host = PlayerId::HOST;
/// let mut session = Session::new(SessionId::new("s"), Player::new(host, "Host"), 3, 3);
/// let id = CardId::new(host, 1);
/// session.player_mut(host).unwrap().push_card(PrivateZone::Hand, Card::new(id, DefinitionId::new(1), host));
///
/// let req = MoveRequest::zone_to_board(id, host, PrivateZone::Hand, CellPos::new(1, 1));
/// assert_eq!(relocate(&mut session, &req), MoveOutcome::Moved);
/// assert_eq!(relocate(&mut session, &req), MoveOutcome::AlreadyApplied);
/// ```
pub fn relocate(session: &mut Session, req: &MoveRequest) -> MoveOutcome {
    if !source_matches(session, req) {
        debug!(card = %req.card_id, from = ?req.from, "move source no longer holds card, treating as applied");
        return MoveOutcome::AlreadyApplied;
    }
    if let Some(rejection) = check_destination(session, req) {
        debug!(card = %req.card_id, ?rejection, "move rejected");
        return MoveOutcome::Rejected(rejection);
    }

    let card = match req.from {
        CardLocation::Board(pos) => session.board.take(pos),
        CardLocation::Zone { player, zone } => session
            .player_mut(player)
            .and_then(|p| p.take_card(zone, req.card_id)),
    };
    let Some(card) = card else {
        return MoveOutcome::AlreadyApplied;
    };

    match req.to {
        Destination::Board(pos) => {
            session.board.set(pos, Some(card));
        }
        Destination::Zone { player, zone, position } => {
            if let Some(target) = session.player_mut(player) {
                let cards = target.zone_mut(zone);
                match position {
                    ZonePosition::Top => cards.push_back(card),
                    ZonePosition::Bottom => cards.push_front(card),
                    ZonePosition::Index(i) => {
                        let idx = i.min(cards.len());
                        cards.insert(idx, card);
                    }
                }
                let size = target.zone_size(zone) + 1;
                target.set_zone_size(zone, size);
            }
        }
    }
    MoveOutcome::Moved
}
