//! Card system: definitions, catalog, and instances.
//!
//! ## Key Types
//!
//! - `DefinitionId`: Identifier into the content catalog
//! - `CardDefinition`: Static card data (name, base power)
//! - `CardCatalog`: Read-only definition lookup
//! - `Card`: Runtime card state (owner, modifiers, statuses)

pub mod catalog;
pub mod definition;
pub mod instance;

pub use catalog::CardCatalog;
pub use definition::{CardDefinition, DefinitionId};
pub use instance::{Card, Status, StatusKind};
