//! Transport envelope, wire messages and transports.
//!
//! ## Key Types
//!
//! - `Envelope`: `{type, senderId, data, timestamp}` wrapper
//! - `Message`: Tagged union of every message kind
//! - `Transport`: Best-effort frame delivery between peers
//! - `MemoryNetwork`: In-process transport for tests and local play

pub mod address;
pub mod envelope;
pub mod memory;
pub mod messages;
pub mod transport;

pub use address::PeerAddress;
pub use envelope::{encode_with_fallback, encode_within, Envelope};
pub use memory::{MemoryNetwork, MemoryTransport};
pub use messages::{DeltaFrame, Message, RejectReason};
pub use transport::{Outbound, Transport};
