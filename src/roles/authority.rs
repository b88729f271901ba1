//! Host authority over guest submissions.
//!
//! A guest may change the board, turn structure and its own player entry.
//! Anything it says about other players is dropped, and connection flags
//! are owned by the Host. When a submission had to be cut, the sender gets
//! a corrective full update.

use tracing::debug;

use crate::cards::CardCatalog;
use crate::core::{PlayerId, PrivateZone, Session};
use crate::delta::StateDelta;
use crate::privacy::{project, BoardCards, Encoding, PublicView, Recipient};

/// Result of sanitizing a guest submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sanitized<T> {
    pub value: T,
    /// Something was dropped; the sender needs a corrective update.
    pub overridden: bool,
}

/// Strip a guest delta down to what `sender` may change.
#[must_use]
pub fn sanitize_guest_delta(delta: &StateDelta, sender: PlayerId, state: &Session) -> Sanitized<StateDelta> {
    let mut clean = delta.clone();
    let mut overridden = false;

    if let Some(map) = clean.player_deltas.as_mut() {
        map.retain(|id, _| {
            let keep = *id == sender;
            if !keep {
                debug!(%sender, target = %id, "dropping guest delta for another player");
            }
            keep
        });
        if let Some(own) = map.get_mut(&sender) {
            if own.is_connected.take().is_some() {
                debug!(%sender, "dropping guest connection flag");
                overridden = true;
            }
        }
        overridden |= delta.player_deltas.as_ref().is_some_and(|m| m.keys().any(|id| *id != sender));
    }

    if let Some(active) = clean.active_player {
        if !state.contains_player(active) {
            clean.active_player = None;
            overridden = true;
        }
    }

    clean.normalize();
    Sanitized {
        value: clean,
        overridden,
    }
}

/// Merge a guest's full view into the Host state.
///
/// Only the board and the sender's own zone contents are taken from the
/// guest. `overridden` reports whether the guest's view disagreed with the
/// Host on anything else.
#[must_use]
pub fn merge_guest_view(
    state: &Session,
    view: PublicView,
    sender: PlayerId,
    catalog: &CardCatalog,
) -> Sanitized<Session> {
    let encoding = match view.board.cards {
        BoardCards::Full(_) => Encoding::Full,
        BoardCards::Compact(_) => Encoding::Compact,
    };
    let submitted = view.clone();
    let guest = view.into_session(catalog);

    let mut merged = state.clone();
    merged.board = guest.board.clone();
    if let (Some(theirs), Some(ours)) = (guest.player(sender), merged.player_mut(sender)) {
        for zone in PrivateZone::ALL {
            if submitted.player(sender).is_some_and(|p| p.zone(zone).is_revealed()) {
                ours.set_zone(zone, theirs.zone(zone).clone());
            }
        }
    }
    for card_id in merged.board.occupied().map(|(_, c)| c.id).collect::<Vec<_>>() {
        // Cards now on the board leave any private zone the Host still has them in.
        for player in merged.players.iter_mut() {
            for zone in PrivateZone::ALL {
                player.take_card(zone, card_id);
            }
        }
    }

    let overridden = project(&merged, Recipient::Player(sender), encoding) != submitted;
    Sanitized {
        value: merged,
        overridden,
    }
}
