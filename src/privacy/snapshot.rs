//! Reconnect snapshots.
//!
//! A returning Guest usually still holds its own cards. The Host therefore
//! sends every non-bot zone (the requester's included) as a bare size and
//! only attaches the requester's contents when the Guest reported no cache,
//! or a cache whose sizes disagree with the Host.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cards::CardCatalog;
use crate::core::{Player, PlayerId, PrivateZone, Session, ZoneSizes};

use super::compact::{compact_all, reconstruct_all, CompactCard};
use super::projector::{project, Encoding, PublicView, Recipient};

/// The requester's private contents in compact form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnCards {
    pub hand: Vec<CompactCard>,
    pub deck: Vec<CompactCard>,
    pub discard: Vec<CompactCard>,
}

impl OwnCards {
    fn of(player: &Player) -> Self {
        Self {
            hand: compact_all(&player.hand),
            deck: compact_all(&player.deck),
            discard: compact_all(&player.discard),
        }
    }

    /// Contents of one zone.
    #[must_use]
    pub fn zone(&self, zone: PrivateZone) -> &[CompactCard] {
        match zone {
            PrivateZone::Hand => &self.hand,
            PrivateZone::Deck => &self.deck,
            PrivateZone::Discard => &self.discard,
        }
    }
}

/// State handed to a Guest resuming a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectSnapshot {
    /// Compact projection with non-bot zones reduced to sizes.
    pub view: PublicView,

    /// Requester's contents, when its cache cannot be trusted.
    #[serde(default)]
    pub own_cards: Option<OwnCards>,
}

impl ReconnectSnapshot {
    /// Build the snapshot for `player`.
    ///
    /// `cached_sizes` are the zone sizes the Guest still holds locally.
    #[must_use]
    pub fn build(state: &Session, player: PlayerId, cached_sizes: Option<ZoneSizes>) -> Self {
        let mut view = project(state, Recipient::Player(player), Encoding::Compact);
        for pv in view.players.iter_mut().filter(|p| !p.is_bot) {
            for zone in PrivateZone::ALL {
                let hidden = pv.zone(zone).to_hidden();
                *pv.zone_mut(zone) = hidden;
            }
        }

        let own_cards = state.player(player).and_then(|own| {
            let cache_ok = cached_sizes.is_some_and(|sizes| sizes == own.sizes);
            (!cache_ok).then(|| OwnCards::of(own))
        });

        Self { view, own_cards }
    }

    /// Rebuild the Guest's local session.
    ///
    /// For each of the Guest's zones: keep the cached cards when their count
    /// matches the Host's counter, else use `own_cards`, else keep only the
    /// counter.
    #[must_use]
    pub fn reconcile(self, cache: Option<&Player>, catalog: &CardCatalog) -> Session {
        let me = self.view.recipient.player_id();
        let own_cards = self.own_cards;
        let mut session = self.view.into_session(catalog);

        let Some(player) = me.and_then(|id| session.player_mut(id)) else {
            return session;
        };

        for zone in PrivateZone::ALL {
            let host_size = player.zone_size(zone);
            let cached = cache
                .map(|c| c.zone(zone))
                .filter(|cards| cards.len() as u32 == host_size);
            if let Some(cards) = cached {
                debug!(player = %player.id, ?zone, size = host_size, "keeping cached zone");
                player.set_zone(zone, cards.clone());
            } else if let Some(own) = own_cards.as_ref() {
                player.set_zone(zone, reconstruct_all(own.zone(zone), player.id, catalog));
            } else {
                warn!(player = %player.id, ?zone, size = host_size, "no contents for own zone, keeping counter");
            }
        }

        session
    }
}
