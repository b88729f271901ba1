//! Computing deltas between two full states.

use crate::core::{Player, PrivateZone, Session};
use crate::privacy::compact_all;

use super::types::{CellChange, PlayerDelta, StateDelta};

fn diff_player(old: &Player, new: &Player) -> PlayerDelta {
    let mut delta = PlayerDelta::default();

    if old.score != new.score {
        delta.score_delta = Some(i64::from(new.score) - i64::from(old.score));
    }
    if old.is_connected != new.is_connected {
        delta.is_connected = Some(new.is_connected);
    }

    for zone in PrivateZone::ALL {
        let (old_size, new_size) = (old.zone_size(zone), new.zone_size(zone));
        if old_size != new_size {
            delta.set_size_delta(zone, Some(new_size as i32 - old_size as i32));
        }
        // Vector equality short-circuits on shared structure.
        if old.zone(zone) != new.zone(zone) {
            delta.set_contents(zone, Some(compact_all(new.zone(zone))));
        }
    }

    delta
}

/// Compute the delta that turns `old` into `new`.
///
/// Only groups that differ are emitted: phase/round/turn/active player,
/// board cells whose card differs, and per-player public fields. Scores are
/// emitted as signed adjustments. Zone contents are emitted in compact form
/// when their card sequence changed; recipients that may not see them get
/// them stripped by `privacy::tailor_delta`.
///
/// Players that exist only in `new` are not described; joins travel as a
/// full state update instead.
///
/// ## Example
///
/// ```
/// use ccg_sync::core::{Player, PlayerId, Session, SessionId};
/// use ccg_sync::delta::diff;
///
/// let s = Session::new(SessionId::new("s"), Player::new(PlayerId::HOST, "Host"), 3, 3);
/// assert!(diff(&s, &s).is_empty());
///
/// let mut t = s.clone();
/// t.player_mut(PlayerId::HOST).unwrap().score = 4;
/// assert_eq!(diff(&s, &t).player(PlayerId::HOST).unwrap().score_delta, Some(4));
/// ```
#[must_use]
pub fn diff(old: &Session, new: &Session) -> StateDelta {
    let mut delta = StateDelta::default();

    if old.phase != new.phase {
        delta.phase = Some(new.phase);
    }
    if old.round_number != new.round_number {
        delta.round = Some(new.round_number);
    }
    if old.turn_number != new.turn_number {
        delta.turn = Some(new.turn_number);
    }
    if old.active_player != new.active_player {
        delta.active_player = new.active_player;
        delta.clear_active_player = new.active_player.is_none();
    }

    if old.board != new.board {
        for pos in new.board.positions() {
            let (before, after) = (old.board.get(pos), new.board.get(pos));
            if before != after {
                delta.push_cell(CellChange::new(pos, after.cloned()));
            }
        }
    }

    for new_player in new.players.iter() {
        let Some(old_player) = old.player(new_player.id) else {
            continue;
        };
        if old_player == new_player {
            continue;
        }
        delta.push_player(new_player.id, diff_player(old_player, new_player));
    }

    delta.normalize();
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Card, DefinitionId};
    use crate::core::{CardId, CellPos, Phase, PlayerId, SessionId};

    fn session() -> Session {
        let mut s = Session::new(SessionId::new("s"), Player::new(PlayerId::HOST, "Host"), 3, 3);
        s.add_player(Player::new(PlayerId::new(2), "Guest"));
        s
    }

    fn card(serial: u32) -> Card {
        Card::new(CardId::new(PlayerId::HOST, serial), DefinitionId::new(1), PlayerId::HOST)
    }

    #[test]
    fn test_identical_states_give_empty_delta() {
        let s = session();
        assert!(diff(&s, &s.clone()).is_empty());
    }

    #[test]
    fn test_counters_and_phase() {
        let old = session();
        let mut new = old.clone();
        new.phase = Phase::Main;
        new.turn_number = 3;
        new.active_player = Some(PlayerId::new(2));

        let d = diff(&old, &new);
        assert_eq!(d.phase, Some(Phase::Main));
        assert_eq!(d.turn, Some(3));
        assert_eq!(d.active_player, Some(PlayerId::new(2)));
        assert_eq!(d.round, None);
        assert!(d.board_cells.is_none());
    }

    #[test]
    fn test_cleared_active_player_is_encoded() {
        let mut old = session();
        old.active_player = Some(PlayerId::new(2));
        let mut new = old.clone();
        new.active_player = None;

        let d = diff(&old, &new);
        assert!(d.clear_active_player);
        assert_eq!(d.active_player, None);
        assert!(!d.is_empty());
        assert!(!diff(&new, &old).clear_active_player);
    }

    #[test]
    fn test_only_changed_cells_emitted() {
        let old = session();
        let mut new = old.clone();
        new.board.set(CellPos::new(1, 1), Some(card(1)));

        let d = diff(&old, &new);
        let cells = d.board_cells.unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].pos(), CellPos::new(1, 1));
        assert_eq!(cells[0].card.as_ref().map(|c| c.id), Some(card(1).id));
    }

    #[test]
    fn test_score_is_signed_delta() {
        let mut old = session();
        old.player_mut(PlayerId::new(2)).unwrap().score = 5;
        let mut new = old.clone();
        new.player_mut(PlayerId::new(2)).unwrap().score = 2;

        let d = diff(&old, &new);
        assert_eq!(d.player(PlayerId::new(2)).unwrap().score_delta, Some(-3));
        assert!(d.player(PlayerId::HOST).is_none());
    }

    #[test]
    fn test_zone_change_carries_sizes_and_contents() {
        let old = session();
        let mut new = old.clone();
        new.player_mut(PlayerId::HOST).unwrap().push_card(PrivateZone::Hand, card(1));

        let d = diff(&old, &new);
        let p = d.player(PlayerId::HOST).unwrap();
        assert_eq!(p.hand_size_delta, Some(1));
        assert_eq!(p.hand.as_ref().map(Vec::len), Some(1));
        assert!(p.deck.is_none());
    }

    #[test]
    fn test_new_players_are_not_described() {
        let old = session();
        let mut new = old.clone();
        new.add_player(Player::new(PlayerId::new(3), "Late"));
        assert!(diff(&old, &new).is_empty());
    }
}
