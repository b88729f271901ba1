//! Persisted record types and their keys.
//!
//! Records are encoded with `bincode`. They must not use serde attributes
//! that need a self-describing format (skipped fields, flattening, tagged
//! enums).

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::core::{PlayerId, Session, SessionId, Timestamp};
use crate::error::Result;
use crate::net::PeerAddress;
use crate::roles::Role;

use super::store::SessionStore;

/// Key of a session record.
#[must_use]
pub fn session_key(id: &SessionId) -> String {
    format!("session:{id}")
}

/// Key of a discovery record.
#[must_use]
pub fn discovery_key(id: &SessionId) -> String {
    format!("discovery:{id}")
}

/// Key of a reconnect intent.
#[must_use]
pub fn reconnect_key(id: &SessionId) -> String {
    format!("reconnect:{id}")
}

/// A guest as the Host remembers it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub player_id: PlayerId,
    pub address: PeerAddress,
    pub token: String,
}

/// Everything needed to resume a session after a restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Full state for the Host, the Guest's own projection for a Guest.
    pub session: Session,
    pub role: Role,
    pub local_player: PlayerId,
    /// Guest: token issued by the Host on join.
    pub peer_token: Option<String>,
    /// Guest: last known Host address.
    pub host_address: Option<PeerAddress>,
    /// Host: known guests.
    pub peers: Vec<PeerRecord>,
    pub saved_at: Timestamp,
}

/// Where the Host can currently be reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub session_id: SessionId,
    pub host_address: PeerAddress,
    pub announced_at: Timestamp,
}

/// Marker that a Guest is trying to get back into a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectIntent {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub host_address: PeerAddress,
    pub started_at: Timestamp,
}

/// Encode and store a record.
pub fn save<T: Serialize>(store: &dyn SessionStore, key: &str, record: &T) -> Result<()> {
    store.put(key, bincode::serialize(record)?)
}

/// Load and decode a record.
pub fn load<T: DeserializeOwned>(store: &dyn SessionStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}
