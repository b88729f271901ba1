//! Session persistence, discovery and reconnection.
//!
//! ## Key Types
//!
//! - `SessionStore`: Key/value storage (`MemoryStore`, `FileStore`)
//! - `SessionRecord`: What a process needs to resume after a restart
//! - `Discovery`: Host address channel, pushed or polled
//! - `ReconnectManager`: Bounded-retry link state machine

pub mod discovery;
pub mod reconnect;
pub mod records;
pub mod store;

pub use discovery::Discovery;
pub use reconnect::{AttemptDecision, LinkState, ReconnectManager};
pub use records::{
    discovery_key, reconnect_key, session_key, DiscoveryRecord, PeerRecord, ReconnectIntent, SessionRecord,
};
pub use store::{FileStore, MemoryStore, SessionStore};
