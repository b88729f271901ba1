//! Players and their private card collections.
//!
//! ## PlayerId
//!
//! Host-assigned identifier, stable for the whole session. The Host itself
//! is `PlayerId(1)`; guests and bots get the next free id on join.
//!
//! ## Player
//!
//! Public fields (score, connection, counters) plus the three private zones.
//! A zone's contents may be unknown locally (another player's hand on a
//! Guest); the counter is then the only truth and the sequence stays empty.

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::cards::Card;

use super::entity::CardId;

/// Player identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Id the Host assigns to itself.
    pub const HOST: PlayerId = PlayerId(1);

    /// Create a new player ID.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw id.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// The three privately-owned card zones of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrivateZone {
    Hand,
    Deck,
    Discard,
}

impl PrivateZone {
    /// All private zones, in wire order.
    pub const ALL: [PrivateZone; 3] = [PrivateZone::Hand, PrivateZone::Deck, PrivateZone::Discard];
}

/// Counters for the three private zones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSizes {
    pub hand: u32,
    pub deck: u32,
    pub discard: u32,
}

impl ZoneSizes {
    /// Counter for one zone.
    #[must_use]
    pub fn get(&self, zone: PrivateZone) -> u32 {
        match zone {
            PrivateZone::Hand => self.hand,
            PrivateZone::Deck => self.deck,
            PrivateZone::Discard => self.discard,
        }
    }
}

/// A session participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Host-assigned id.
    pub id: PlayerId,

    /// Display name.
    pub name: String,

    /// Bot (dummy) players have publicly visible cards.
    pub is_bot: bool,

    /// Hand contents, empty when not visible locally.
    pub hand: Vector<Card>,

    /// Deck contents, top = end.
    pub deck: Vector<Card>,

    /// Discard pile contents.
    pub discard: Vector<Card>,

    /// Public counters; equal to the contents' lengths whenever the contents are known.
    pub sizes: ZoneSizes,

    /// Never negative.
    pub score: u32,

    /// Whether the player's process is currently linked.
    pub is_connected: bool,

    /// Card-back style shown for hidden cards.
    pub deck_back_style: String,
}

impl Player {
    /// Create a connected human player with empty zones.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_bot: false,
            hand: Vector::new(),
            deck: Vector::new(),
            discard: Vector::new(),
            sizes: ZoneSizes::default(),
            score: 0,
            is_connected: true,
            deck_back_style: "default".to_string(),
        }
    }

    /// Create a bot player. Bots are always considered connected.
    #[must_use]
    pub fn bot(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::new(id, name)
        }
    }

    /// Set the card-back style (builder pattern).
    #[must_use]
    pub fn with_deck_back(mut self, style: impl Into<String>) -> Self {
        self.deck_back_style = style.into();
        self
    }

    // === Zones ===

    /// Contents of a zone.
    #[must_use]
    pub fn zone(&self, zone: PrivateZone) -> &Vector<Card> {
        match zone {
            PrivateZone::Hand => &self.hand,
            PrivateZone::Deck => &self.deck,
            PrivateZone::Discard => &self.discard,
        }
    }

    /// Mutable contents of a zone. Call `sync_sizes` after editing.
    pub fn zone_mut(&mut self, zone: PrivateZone) -> &mut Vector<Card> {
        match zone {
            PrivateZone::Hand => &mut self.hand,
            PrivateZone::Deck => &mut self.deck,
            PrivateZone::Discard => &mut self.discard,
        }
    }

    /// Counter of a zone.
    #[must_use]
    pub fn zone_size(&self, zone: PrivateZone) -> u32 {
        self.sizes.get(zone)
    }

    /// Overwrite the counter of a zone.
    pub fn set_zone_size(&mut self, zone: PrivateZone, size: u32) {
        match zone {
            PrivateZone::Hand => self.sizes.hand = size,
            PrivateZone::Deck => self.sizes.deck = size,
            PrivateZone::Discard => self.sizes.discard = size,
        }
    }

    /// Replace a zone's contents and make its counter match.
    pub fn set_zone(&mut self, zone: PrivateZone, cards: Vector<Card>) {
        let len = cards.len() as u32;
        *self.zone_mut(zone) = cards;
        self.set_zone_size(zone, len);
    }

    /// Reset every counter to its zone's length.
    ///
    /// Only valid where contents are authoritative (the Host, or a player
    /// about its own zones).
    pub fn sync_sizes(&mut self) {
        for zone in PrivateZone::ALL {
            let len = self.zone(zone).len() as u32;
            self.set_zone_size(zone, len);
        }
    }

    /// Append a card to a zone, keeping the counter in step.
    pub fn push_card(&mut self, zone: PrivateZone, card: Card) {
        self.zone_mut(zone).push_back(card);
        let size = self.zone_size(zone) + 1;
        self.set_zone_size(zone, size);
    }

    /// Remove a card by id from a zone.
    ///
    /// Returns the removed card, or `None` if it was not there.
    pub fn take_card(&mut self, zone: PrivateZone, id: CardId) -> Option<Card> {
        let pos = self.zone(zone).iter().position(|c| c.id == id)?;
        let card = self.zone_mut(zone).remove(pos);
        let size = self.zone_size(zone).saturating_sub(1);
        self.set_zone_size(zone, size);
        Some(card)
    }

    /// Find which private zone holds a card.
    #[must_use]
    pub fn find_card(&self, id: CardId) -> Option<PrivateZone> {
        PrivateZone::ALL
            .into_iter()
            .find(|&zone| self.zone(zone).iter().any(|c| c.id == id))
    }

    /// Apply a signed score change, clamping at zero.
    pub fn add_score(&mut self, delta: i64) {
        self.score = (i64::from(self.score) + delta).clamp(0, i64::from(u32::MAX)) as u32;
    }
}
