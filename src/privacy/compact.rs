//! Compact card encoding.
//!
//! Private zone contents travel as `CompactCard`s: only the per-instance
//! fields. Everything derivable from the catalog (base power, name, art) is
//! re-joined by the recipient in `reconstruct`. Compact cards are only ever
//! addressed to the card's owner, or describe a bot's public cards.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cards::{Card, CardCatalog, DefinitionId, Status};
use crate::core::{CardId, PlayerId};
use crate::error::{Result, SyncError};

/// Per-instance card data without catalog-derived fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactCard {
    pub id: CardId,
    pub definition_id: DefinitionId,
    /// Power modifier.
    pub power: i32,
    #[serde(default)]
    pub face_down: bool,
    #[serde(default)]
    pub statuses: SmallVec<[Status; 2]>,
}

impl From<&Card> for CompactCard {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id,
            definition_id: card.definition_id,
            power: card.power_modifier,
            face_down: card.is_face_down,
            statuses: card.statuses.clone(),
        }
    }
}

/// Compact form of a sequence of cards.
pub fn compact_all<'a>(cards: impl IntoIterator<Item = &'a Card>) -> Vec<CompactCard> {
    cards.into_iter().map(CompactCard::from).collect()
}

/// Rehydrate a full card from its compact form.
///
/// `owner` comes from the zone the card was received in. Fails when the
/// definition is missing from the local catalog, which happens when peers
/// run different content versions.
pub fn reconstruct(compact: &CompactCard, owner: PlayerId, catalog: &CardCatalog) -> Result<Card> {
    let def = catalog
        .get(compact.definition_id)
        .ok_or(SyncError::UnknownDefinition(compact.definition_id))?;
    Ok(Card {
        id: compact.id,
        definition_id: compact.definition_id,
        owner_id: owner,
        base_power: def.base_power,
        power_modifier: compact.power,
        is_face_down: compact.face_down,
        statuses: compact.statuses.clone(),
    })
}

/// Rehydrate a sequence, dropping (and logging) cards with unknown definitions.
pub fn reconstruct_all(compact: &[CompactCard], owner: PlayerId, catalog: &CardCatalog) -> im::Vector<Card> {
    compact
        .iter()
        .filter_map(|c| match reconstruct(c, owner, catalog) {
            Ok(card) => Some(card),
            Err(err) => {
                tracing::warn!(card = %c.id, %err, "dropping card that cannot be rehydrated");
                None
            }
        })
        .collect()
}
