//! Applying deltas to a local state.
//!
//! `apply` never fails. Entries a peer cannot use (out-of-range cells,
//! unknown players, unknown card definitions) are dropped with a warning,
//! because peers are not guaranteed to run the same schema mid-session.

use tracing::warn;

use crate::cards::CardCatalog;
use crate::core::{CardLocation, Player, PlayerId, PrivateZone, Session};
use crate::privacy::reconstruct_all;

use super::types::{CellChange, PlayerDelta, StateDelta};

/// Who is applying a delta, which decides whether private contents are used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Viewer {
    /// The Host: sees every zone.
    Omniscient,
    /// A Guest: sees its own zones and bot zones.
    Player(PlayerId),
}

impl Viewer {
    /// Whether this viewer may hold `player`'s private contents.
    #[must_use]
    pub fn may_see(self, player: &Player) -> bool {
        match self {
            Viewer::Omniscient => true,
            Viewer::Player(id) => id == player.id || player.is_bot,
        }
    }
}

/// Context for `apply`.
#[derive(Clone, Copy, Debug)]
pub struct ApplyContext<'a> {
    /// Who is applying.
    pub viewer: Viewer,

    /// Catalog used to rehydrate compact zone contents.
    pub catalog: &'a CardCatalog,
}

impl<'a> ApplyContext<'a> {
    /// Create an apply context.
    #[must_use]
    pub fn new(viewer: Viewer, catalog: &'a CardCatalog) -> Self {
        Self { viewer, catalog }
    }
}

fn apply_cell(state: &mut Session, change: &CellChange) {
    let pos = change.pos();
    if !state.board.contains(pos) {
        warn!(%pos, "dropping board change outside the board");
        return;
    }
    match &change.card {
        None => {
            state.board.set(pos, None);
        }
        Some(card) => {
            let already_here = state.board.get(pos).is_some_and(|c| c.id == card.id);
            if !already_here {
                // A card lives in exactly one place.
                state.evict_card(card.id);
            }
            state.board.set(pos, Some(card.clone()));
        }
    }
}

fn apply_player(state: &mut Session, id: PlayerId, delta: &PlayerDelta, ctx: &ApplyContext<'_>) {
    let Some(visible) = state.player(id).map(|p| ctx.viewer.may_see(p)) else {
        warn!(player = %id, "dropping delta for unknown player");
        return;
    };

    for zone in PrivateZone::ALL {
        let Some(contents) = delta.contents(zone).filter(|_| visible) else {
            continue;
        };
        let cards = reconstruct_all(contents, id, ctx.catalog);
        for card in cards.iter() {
            let elsewhere = state
                .locate(card.id)
                .is_some_and(|loc| loc != CardLocation::Zone { player: id, zone });
            if elsewhere {
                state.evict_card(card.id);
            }
        }
        if let Some(player) = state.player_mut(id) {
            player.set_zone(zone, cards);
        }
    }

    let Some(player) = state.player_mut(id) else {
        return;
    };
    if let Some(score) = delta.score_delta {
        player.add_score(score);
    }
    if let Some(connected) = delta.is_connected {
        player.is_connected = connected;
    }
    for zone in PrivateZone::ALL {
        let replaced = visible && delta.contents(zone).is_some();
        if replaced {
            continue;
        }
        if let Some(change) = delta.size_delta(zone) {
            let size = (i64::from(player.zone_size(zone)) + i64::from(change)).max(0) as u32;
            player.set_zone_size(zone, size);
        }
    }
}

/// Apply `delta` to `state`, returning the new state.
///
/// - Board entries replace a cell wholesale. Placing a card first removes
///   that card id from everywhere else, so a card is never duplicated even
///   when moves arrive out of order.
/// - Scores accumulate and clamp at zero.
/// - Size deltas adjust counters. Compact contents replace a zone only when
///   the viewer may see it; the counter then equals the zone's length.
///
/// Board replacement is idempotent. Numeric adjustments are not: callers
/// must apply each generated delta at most once.
#[must_use]
pub fn apply(state: &Session, delta: &StateDelta, ctx: &ApplyContext<'_>) -> Session {
    let mut next = state.clone();

    if let Some(phase) = delta.phase {
        next.phase = phase;
    }
    if let Some(round) = delta.round {
        next.round_number = round;
    }
    if let Some(turn) = delta.turn {
        next.turn_number = turn;
    }
    if let Some(active) = delta.active_player {
        if next.contains_player(active) {
            next.active_player = Some(active);
        } else {
            warn!(player = %active, "dropping unknown active player");
        }
    } else if delta.clear_active_player {
        next.active_player = None;
    }

    for change in delta.board_cells.iter().flatten() {
        apply_cell(&mut next, change);
    }

    for (id, player_delta) in delta.player_deltas.iter().flatten() {
        apply_player(&mut next, *id, player_delta, ctx);
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Card, CardDefinition, DefinitionId};
    use crate::core::{CardId, CellPos, SessionId};
    use crate::delta::diff;
    use crate::privacy::compact_all;

    fn catalog() -> CardCatalog {
        CardCatalog::from_definitions([CardDefinition::new(DefinitionId::new(1), "Knight").with_base_power(2)])
    }

    fn session() -> Session {
        let mut s = Session::new(SessionId::new("s"), Player::new(PlayerId::HOST, "Host"), 3, 3);
        s.add_player(Player::new(PlayerId::new(2), "Guest"));
        s
    }

    fn card(owner: u8, serial: u32) -> Card {
        Card::new(CardId::new(PlayerId::new(owner), serial), DefinitionId::new(1), PlayerId::new(owner))
            .with_base_power(2)
    }

    #[test]
    fn test_board_delta_idempotent() {
        let catalog = catalog();
        let ctx = ApplyContext::new(Viewer::Player(PlayerId::new(2)), &catalog);
        let mut delta = StateDelta::default();
        delta.push_cell(CellChange::new(CellPos::new(1, 1), None));
        delta.push_cell(CellChange::new(CellPos::new(2, 2), Some(card(1, 123))));

        let mut s = session();
        s.board.set(CellPos::new(1, 1), Some(card(1, 123)));

        let once = apply(&s, &delta, &ctx);
        let twice = apply(&once, &delta, &ctx);

        assert_eq!(once, twice);
        assert_eq!(twice.board.count(card(1, 123).id), 1);
        assert_eq!(twice.board.find(card(1, 123).id), Some(CellPos::new(2, 2)));
    }

    #[test]
    fn test_out_of_order_moves_never_duplicate() {
        let catalog = catalog();
        let ctx = ApplyContext::new(Viewer::Omniscient, &catalog);
        let c = card(1, 9);

        let mut s = session();
        s.board.set(CellPos::new(0, 0), Some(c.clone()));

        // Second move (B -> C) arrives before the first (A -> B).
        let mut second = StateDelta::default();
        second.push_cell(CellChange::new(CellPos::new(0, 1), None));
        second.push_cell(CellChange::new(CellPos::new(0, 2), Some(c.clone())));
        let mut first = StateDelta::default();
        first.push_cell(CellChange::new(CellPos::new(0, 0), None));
        first.push_cell(CellChange::new(CellPos::new(0, 1), Some(c.clone())));

        let s = apply(&s, &second, &ctx);
        let s = apply(&s, &first, &ctx);
        assert_eq!(s.board.count(c.id), 1);
    }

    #[test]
    fn test_score_accumulates_and_clamps() {
        let catalog = catalog();
        let ctx = ApplyContext::new(Viewer::Omniscient, &catalog);
        let mut delta = StateDelta::default();
        delta.push_player(PlayerId::new(2), PlayerDelta { score_delta: Some(-7), ..Default::default() });

        let mut s = session();
        s.player_mut(PlayerId::new(2)).unwrap().score = 5;

        let s = apply(&s, &delta, &ctx);
        assert_eq!(s.player(PlayerId::new(2)).unwrap().score, 0);
    }

    #[test]
    fn test_size_delta_adjusts_counter_only_for_hidden_zone() {
        let catalog = catalog();
        let ctx = ApplyContext::new(Viewer::Player(PlayerId::new(2)), &catalog);
        let mut delta = StateDelta::default();
        delta.push_player(
            PlayerId::HOST,
            PlayerDelta {
                hand_size_delta: Some(2),
                hand: Some(compact_all([&card(1, 1), &card(1, 2)])),
                ..Default::default()
            },
        );

        let s = apply(&session(), &delta, &ctx);
        let host = s.player(PlayerId::HOST).unwrap();
        assert_eq!(host.sizes.hand, 2);
        assert!(host.hand.is_empty());
    }

    #[test]
    fn test_own_contents_are_reconstructed() {
        let catalog = catalog();
        let ctx = ApplyContext::new(Viewer::Player(PlayerId::new(2)), &catalog);
        let mut delta = StateDelta::default();
        delta.push_player(
            PlayerId::new(2),
            PlayerDelta {
                hand_size_delta: Some(1),
                hand: Some(compact_all([&card(2, 1)])),
                ..Default::default()
            },
        );

        let s = apply(&session(), &delta, &ctx);
        let me = s.player(PlayerId::new(2)).unwrap();
        assert_eq!(me.sizes.hand, 1);
        assert_eq!(me.hand[0].base_power, 2);
    }

    #[test]
    fn test_unknown_player_and_cell_dropped() {
        let catalog = catalog();
        let ctx = ApplyContext::new(Viewer::Omniscient, &catalog);
        let mut delta = StateDelta::default();
        delta.push_player(PlayerId::new(9), PlayerDelta { score_delta: Some(1), ..Default::default() });
        delta.push_cell(CellChange::new(CellPos::new(7, 7), Some(card(1, 1))));

        let s = session();
        assert_eq!(apply(&s, &delta, &ctx), s);
    }

    #[test]
    fn test_round_trip_for_mover() {
        let catalog = catalog();
        let mut old = session();
        old.player_mut(PlayerId::new(2)).unwrap().push_card(PrivateZone::Hand, card(2, 1));

        let mut new = old.clone();
        let moved = new.player_mut(PlayerId::new(2)).unwrap().take_card(PrivateZone::Hand, card(2, 1).id);
        new.board.set(CellPos::new(0, 1), moved);
        new.player_mut(PlayerId::new(2)).unwrap().score = 3;

        let delta = diff(&old, &new);
        let ctx = ApplyContext::new(Viewer::Player(PlayerId::new(2)), &catalog);
        assert_eq!(apply(&old, &delta, &ctx), new);
    }

    #[test]
    fn test_active_player_clear() {
        let catalog = catalog();
        let ctx = ApplyContext::new(Viewer::Omniscient, &catalog);
        let mut s = session();
        s.active_player = Some(PlayerId::new(2));

        let cleared = apply(&s, &StateDelta { clear_active_player: true, ..Default::default() }, &ctx);
        assert_eq!(cleared.active_player, None);

        let both = StateDelta { active_player: Some(PlayerId::HOST), clear_active_player: true, ..Default::default() };
        assert_eq!(apply(&cleared, &both, &ctx).active_player, Some(PlayerId::HOST));
    }
}
