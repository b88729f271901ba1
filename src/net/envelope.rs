//! The JSON envelope and its size-aware codec.
//!
//! ## Wire format
//!
//! ```json
//! {"type": "STATE_DELTA", "senderId": "peer-a", "data": {...}, "timestamp": 1200}
//! ```
//!
//! `type` and `data` come from `Message`; the envelope adds the sender's
//! address and the send time. Peers may emit the keys in any order, so the
//! body is held raw until the tag is known.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::info;

use crate::core::Timestamp;
use crate::error::{Result, SyncError};
use crate::privacy::Encoding;

use super::address::PeerAddress;
use super::messages::Message;

/// A message with its sender and send time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub message: Message,
    pub sender_id: PeerAddress,
    pub timestamp: Timestamp,
}

impl Envelope {
    /// Wrap a message.
    #[must_use]
    pub fn new(message: Message, sender_id: PeerAddress, timestamp: Timestamp) -> Self {
        Self {
            message,
            sender_id,
            timestamp,
        }
    }

    /// Encode to JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let frame = OutgoingFrame {
            message: &self.message,
            sender_id: &self.sender_id,
            timestamp: self.timestamp,
        };
        Ok(serde_json::to_vec(&frame)?)
    }

    /// Decode from JSON bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let frame: IncomingFrame = serde_json::from_slice(bytes)?;
        // Tag first: the body then deserializes straight into its variant
        // and integer map keys such as player ids parse from their strings.
        let tag = serde_json::to_string(&frame.kind)?;
        let tagged = match &frame.data {
            Some(data) => format!("{{\"type\":{},\"data\":{}}}", tag, data.get()),
            None => format!("{{\"type\":{}}}", tag),
        };
        Ok(Self {
            message: serde_json::from_str(&tagged)?,
            sender_id: frame.sender_id,
            timestamp: frame.timestamp,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingFrame<'a> {
    #[serde(flatten)]
    message: &'a Message,
    sender_id: &'a PeerAddress,
    timestamp: Timestamp,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
    sender_id: PeerAddress,
    timestamp: Timestamp,
}

/// Encode a message, failing with `PayloadTooLarge` above `max` bytes.
pub fn encode_within(envelope: &Envelope, max: usize) -> Result<Vec<u8>> {
    let frame = envelope.encode()?;
    if frame.len() > max {
        return Err(SyncError::PayloadTooLarge { size: frame.len(), max });
    }
    Ok(frame)
}

/// Encode a view-carrying message, falling back to the compact encoding when
/// the full one exceeds `max` bytes.
///
/// `build` produces the message for a given encoding.
pub fn encode_with_fallback(
    sender: &PeerAddress,
    now: Timestamp,
    max: usize,
    build: impl Fn(Encoding) -> Message,
) -> Result<Vec<u8>> {
    let full = Envelope::new(build(Encoding::Full), sender.clone(), now);
    match encode_within(&full, max) {
        Err(SyncError::PayloadTooLarge { size, .. }) => {
            info!(kind = full.message.kind(), size, max, "frame too large, retrying with compact encoding");
            let compact = Envelope::new(build(Encoding::Compact), sender.clone(), now);
            encode_within(&compact, max)
        }
        other => other,
    }
}
