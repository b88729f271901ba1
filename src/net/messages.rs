//! Typed wire messages.
//!
//! One variant per envelope `type`. Handlers match on `Message`
//! exhaustively, so a new message kind cannot be silently ignored.

use serde::{Deserialize, Serialize};

use crate::core::{PlayerId, SessionId, ZoneSizes};
use crate::delta::StateDelta;
use crate::privacy::{PublicView, ReconnectSnapshot};

use super::address::PeerAddress;

/// Why the Host turned a peer away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SessionFull,
    BadToken,
    UnknownPlayer,
    NotHost,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectReason::SessionFull => "session is full",
            RejectReason::BadToken => "peer token does not match",
            RejectReason::UnknownPlayer => "player is not part of the session",
            RejectReason::NotHost => "peer is not hosting a session",
        };
        f.write_str(text)
    }
}

/// A delta plus its de-duplication key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaFrame {
    /// Random per sender process start.
    pub epoch: u64,
    /// Increases with every delta the process sends.
    pub seq: u64,
    pub delta: StateDelta,
}

/// Message body of an envelope.
#[allow(clippy::large_enum_variant)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    JoinRequest {
        name: String,
        deck_back_style: String,
    },

    JoinAccept {
        player_id: PlayerId,
        peer_token: String,
        view: PublicView,
    },

    JoinReject {
        reason: RejectReason,
    },

    StateDelta(DeltaFrame),

    StateUpdate {
        view: PublicView,
    },

    ReconnectRequest {
        session_id: SessionId,
        player_id: PlayerId,
        peer_token: String,
        cached_sizes: Option<ZoneSizes>,
    },

    ReconnectSnapshot(ReconnectSnapshot),

    PeerAddressAnnounce {
        session_id: SessionId,
        address: PeerAddress,
    },

    Leave {
        player_id: PlayerId,
    },
}

impl Message {
    /// Wire name of the message type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Message::JoinRequest { .. } => "JOIN_REQUEST",
            Message::JoinAccept { .. } => "JOIN_ACCEPT",
            Message::JoinReject { .. } => "JOIN_REJECT",
            Message::StateDelta(_) => "STATE_DELTA",
            Message::StateUpdate { .. } => "STATE_UPDATE",
            Message::ReconnectRequest { .. } => "RECONNECT_REQUEST",
            Message::ReconnectSnapshot(_) => "RECONNECT_SNAPSHOT",
            Message::PeerAddressAnnounce { .. } => "PEER_ADDRESS_ANNOUNCE",
            Message::Leave { .. } => "LEAVE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_tagging() {
        let msg = Message::JoinRequest {
            name: "Ada".into(),
            deck_back_style: "red".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "JOIN_REQUEST", "data": {"name": "Ada", "deckBackStyle": "red"}})
        );
        assert_eq!(json["type"], msg.kind());
    }

    #[test]
    fn test_newtype_payload() {
        let msg = Message::StateDelta(DeltaFrame {
            epoch: 9,
            seq: 1,
            delta: StateDelta { round: Some(2), ..Default::default() },
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "STATE_DELTA");
        assert_eq!(json["data"]["delta"]["round"], 2);

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
