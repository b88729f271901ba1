//! Per-recipient projection of the session.
//!
//! ## Visibility
//!
//! A recipient sees:
//! - The board, phase, counters and every player's public fields
//! - Its own private zones
//! - Every bot's private zones
//!
//! Any other zone is reduced to its size. With `Encoding::Full` hidden
//! zones carry one placeholder per card (owner and card-back style only);
//! with `Encoding::Compact` the placeholders are omitted and the recipient
//! synthesizes them from the size.

use serde::{Deserialize, Serialize};

use crate::cards::{Card, CardCatalog};
use crate::core::{Board, CellPos, Phase, Player, PlayerId, PrivateZone, Session, SessionId};
use crate::delta::StateDelta;

use super::compact::{compact_all, reconstruct, reconstruct_all, CompactCard};

/// Card representation used for revealed cards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// Full cards, placeholders for hidden zones.
    Full,
    /// Compact cards, sizes only for hidden zones.
    Compact,
}

/// Who a projection is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    Player(PlayerId),
    /// A spectator: no private zone except bots'.
    Observer,
}

impl Recipient {
    /// Whether this recipient may see `player`'s private contents.
    #[must_use]
    pub fn may_see(self, player: &Player) -> bool {
        player.is_bot || self == Recipient::Player(player.id)
    }

    /// The recipient's player id, if it is a player.
    #[must_use]
    pub fn player_id(self) -> Option<PlayerId> {
        match self {
            Recipient::Player(id) => Some(id),
            Recipient::Observer => None,
        }
    }
}

/// Stand-in for a hidden card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub owner_id: PlayerId,
    pub deck_back_style: String,
}

/// One private zone as a recipient sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneView {
    Revealed(Vec<Card>),
    Compact(Vec<CompactCard>),
    Hidden {
        size: u32,
        #[serde(default)]
        placeholders: Vec<Placeholder>,
    },
}

impl ZoneView {
    /// Number of cards in the zone.
    #[must_use]
    pub fn size(&self) -> u32 {
        match self {
            ZoneView::Revealed(cards) => cards.len() as u32,
            ZoneView::Compact(cards) => cards.len() as u32,
            ZoneView::Hidden { size, .. } => *size,
        }
    }

    /// Whether card contents are present.
    #[must_use]
    pub fn is_revealed(&self) -> bool {
        !matches!(self, ZoneView::Hidden { .. })
    }

    /// Reduce to a bare size without placeholders.
    #[must_use]
    pub fn to_hidden(&self) -> ZoneView {
        ZoneView::Hidden {
            size: self.size(),
            placeholders: Vec::new(),
        }
    }
}

/// A board card in compact form. Board cards are public, so the owner
/// travels with the card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedCompactCard {
    pub row: u8,
    pub col: u8,
    pub owner_id: PlayerId,
    pub card: CompactCard,
}

/// Occupied board cells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardCards {
    Full(Vec<(CellPos, Card)>),
    Compact(Vec<PlacedCompactCard>),
}

/// The board as sent to a recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardView {
    pub rows: u8,
    pub cols: u8,
    pub cards: BoardCards,
}

/// One player as a recipient sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_bot: bool,
    pub is_connected: bool,
    pub score: u32,
    pub deck_back_style: String,
    pub hand: ZoneView,
    pub deck: ZoneView,
    pub discard: ZoneView,
}

impl PlayerView {
    /// View of one zone.
    #[must_use]
    pub fn zone(&self, zone: PrivateZone) -> &ZoneView {
        match zone {
            PrivateZone::Hand => &self.hand,
            PrivateZone::Deck => &self.deck,
            PrivateZone::Discard => &self.discard,
        }
    }

    /// Mutable view of one zone.
    pub fn zone_mut(&mut self, zone: PrivateZone) -> &mut ZoneView {
        match zone {
            PrivateZone::Hand => &mut self.hand,
            PrivateZone::Deck => &mut self.deck,
            PrivateZone::Discard => &mut self.discard,
        }
    }
}

/// A session projected for one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicView {
    pub session_id: SessionId,
    pub host_id: PlayerId,
    pub phase: Phase,
    pub round: u32,
    pub turn: u32,
    pub active_player: Option<PlayerId>,
    pub board: BoardView,
    pub players: Vec<PlayerView>,
    pub recipient: Recipient,
}

fn zone_view(player: &Player, zone: PrivateZone, visible: bool, encoding: Encoding) -> ZoneView {
    match (visible, encoding) {
        (true, Encoding::Full) => ZoneView::Revealed(player.zone(zone).iter().cloned().collect()),
        (true, Encoding::Compact) => ZoneView::Compact(compact_all(player.zone(zone))),
        (false, Encoding::Full) => {
            let size = player.zone_size(zone);
            let placeholder = Placeholder {
                owner_id: player.id,
                deck_back_style: player.deck_back_style.clone(),
            };
            ZoneView::Hidden {
                size,
                placeholders: vec![placeholder; size as usize],
            }
        }
        (false, Encoding::Compact) => ZoneView::Hidden {
            size: player.zone_size(zone),
            placeholders: Vec::new(),
        },
    }
}

fn board_view(board: &Board, encoding: Encoding) -> BoardView {
    let cards = match encoding {
        Encoding::Full => BoardCards::Full(board.occupied().map(|(pos, card)| (pos, card.clone())).collect()),
        Encoding::Compact => BoardCards::Compact(
            board
                .occupied()
                .map(|(pos, card)| PlacedCompactCard {
                    row: pos.row,
                    col: pos.col,
                    owner_id: card.owner_id,
                    card: CompactCard::from(card),
                })
                .collect(),
        ),
    };
    BoardView {
        rows: board.rows(),
        cols: board.cols(),
        cards,
    }
}

/// Project `state` for `recipient`.
#[must_use]
pub fn project(state: &Session, recipient: Recipient, encoding: Encoding) -> PublicView {
    let players = state
        .players
        .iter()
        .map(|player| {
            let visible = recipient.may_see(player);
            PlayerView {
                id: player.id,
                name: player.name.clone(),
                is_bot: player.is_bot,
                is_connected: player.is_connected,
                score: player.score,
                deck_back_style: player.deck_back_style.clone(),
                hand: zone_view(player, PrivateZone::Hand, visible, encoding),
                deck: zone_view(player, PrivateZone::Deck, visible, encoding),
                discard: zone_view(player, PrivateZone::Discard, visible, encoding),
            }
        })
        .collect();

    PublicView {
        session_id: state.session_id.clone(),
        host_id: state.host_id,
        phase: state.phase,
        round: state.round_number,
        turn: state.turn_number,
        active_player: state.active_player,
        board: board_view(&state.board, encoding),
        players,
        recipient,
    }
}

/// Strip zone contents the recipient may not see from an outbound delta.
#[must_use]
pub fn tailor_delta(delta: &StateDelta, state: &Session, recipient: Recipient) -> StateDelta {
    let mut tailored = delta.clone();
    if let Some(map) = tailored.player_deltas.as_mut() {
        for (id, player_delta) in map.iter_mut() {
            let visible = state.player(*id).is_some_and(|p| recipient.may_see(p));
            if !visible {
                player_delta.strip_contents();
            }
        }
    }
    tailored.normalize();
    tailored
}

impl PublicView {
    /// Player entry of the view.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Build the recipient's local session from the view.
    ///
    /// Hidden zones become empty sequences with the advertised counters.
    /// Cards whose definition is missing from `catalog` are dropped.
    #[must_use]
    pub fn into_session(self, catalog: &CardCatalog) -> Session {
        let mut players = im::Vector::new();
        for view in self.players {
            let mut player = Player::new(view.id, view.name);
            player.is_bot = view.is_bot;
            player.is_connected = view.is_connected;
            player.score = view.score;
            player.deck_back_style = view.deck_back_style;
            for (zone, zv) in [
                (PrivateZone::Hand, view.hand),
                (PrivateZone::Deck, view.deck),
                (PrivateZone::Discard, view.discard),
            ] {
                match zv {
                    ZoneView::Revealed(cards) => player.set_zone(zone, cards.into_iter().collect()),
                    ZoneView::Compact(cards) => player.set_zone(zone, reconstruct_all(&cards, view.id, catalog)),
                    ZoneView::Hidden { size, .. } => player.set_zone_size(zone, size),
                }
            }
            players.push_back(player);
        }

        let mut board = Board::new(self.board.rows, self.board.cols);
        match self.board.cards {
            BoardCards::Full(cards) => {
                for (pos, card) in cards {
                    if !board.set(pos, Some(card)) {
                        tracing::warn!(%pos, "dropping board card outside the board");
                    }
                }
            }
            BoardCards::Compact(cards) => {
                for placed in cards {
                    let pos = CellPos::new(placed.row, placed.col);
                    match reconstruct(&placed.card, placed.owner_id, catalog) {
                        Ok(card) => {
                            board.set(pos, Some(card));
                        }
                        Err(err) => tracing::warn!(%pos, %err, "dropping board card that cannot be rehydrated"),
                    }
                }
            }
        }

        Session {
            session_id: self.session_id,
            host_id: self.host_id,
            phase: self.phase,
            round_number: self.round,
            turn_number: self.turn,
            active_player: self.active_player,
            board,
            players,
        }
    }
}
