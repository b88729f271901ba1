//! Card definitions - static card data from the content catalog.
//!
//! `CardDefinition` holds what never changes for a kind of card: name and
//! base power. Instance data (power modifier, statuses, owner) is stored in
//! `Card`. Definitions are never sent over the wire; peers join on
//! `DefinitionId` against their own copy of the catalog.

use serde::{Deserialize, Serialize};

/// Identifier of a card definition in the content catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DefinitionId(pub u32);

impl DefinitionId {
    /// Create a new definition ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Def({})", self.0)
    }
}

/// Static card definition.
///
/// ## Example
///
/// ```
/// use ccg_sync::cards::{CardDefinition, DefinitionId};
///
/// let knight = CardDefinition::new(DefinitionId::new(1), "Knight").with_base_power(3);
/// assert_eq!(knight.base_power, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDefinition {
    /// Unique identifier for this definition.
    pub id: DefinitionId,

    /// Card name (for display/debugging).
    pub name: String,

    /// Power before instance modifiers.
    pub base_power: i32,
}

impl CardDefinition {
    /// Create a new card definition with zero base power.
    #[must_use]
    pub fn new(id: DefinitionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            base_power: 0,
        }
    }

    /// Set base power (builder pattern).
    #[must_use]
    pub fn with_base_power(mut self, power: i32) -> Self {
        self.base_power = power;
        self
    }
}
