//! Read-only content catalog.
//!
//! The catalog is loaded by an external collaborator before a session
//! starts. The engine only reads it, to rehydrate compact cards received
//! over the wire.

use rustc_hash::FxHashMap;

use super::definition::{CardDefinition, DefinitionId};

/// Catalog of card definitions.
///
/// ## Example
///
/// ```
/// use ccg_sync::cards::{CardCatalog, CardDefinition, DefinitionId};
///
/// let catalog = CardCatalog::from_definitions([
///     CardDefinition::new(DefinitionId::new(1), "Knight").with_base_power(3),
/// ]);
///
/// assert_eq!(catalog.get(DefinitionId::new(1)).unwrap().name, "Knight");
/// ```
#[derive(Clone, Debug, Default)]
pub struct CardCatalog {
    definitions: FxHashMap<DefinitionId, CardDefinition>,
}

impl CardCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from definitions. Later duplicates replace earlier ones.
    pub fn from_definitions(defs: impl IntoIterator<Item = CardDefinition>) -> Self {
        let mut catalog = Self::new();
        for def in defs {
            catalog.register(def);
        }
        catalog
    }

    /// Register a definition, returning the one it replaced.
    pub fn register(&mut self, def: CardDefinition) -> Option<CardDefinition> {
        self.definitions.insert(def.id, def)
    }

    /// Get a definition by ID.
    #[must_use]
    pub fn get(&self, id: DefinitionId) -> Option<&CardDefinition> {
        self.definitions.get(&id)
    }

    /// Check if a definition is registered.
    #[must_use]
    pub fn contains(&self, id: DefinitionId) -> bool {
        self.definitions.contains_key(&id)
    }

    /// Get the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
