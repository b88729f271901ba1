use crate::error::TransportError;

use super::address::PeerAddress;

/// A frame queued for delivery to a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub to: PeerAddress,
    pub frame: Vec<u8>,
}

/// Datagram-style link to other peers.
///
/// Implementations wrap a WebRTC data channel, a relay socket, or the
/// in-memory `MemoryNetwork`. Delivery is best effort: frames may be lost,
/// duplicated or reordered.
pub trait Transport {
    /// Address other peers use to reach this endpoint.
    fn local_address(&self) -> PeerAddress;

    /// Send one frame.
    fn send(&mut self, to: &PeerAddress, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Largest frame the link accepts.
    fn max_payload(&self) -> usize;

    /// Send every queued frame, collecting the addresses that failed.
    fn send_all(&mut self, outbound: Vec<Outbound>) -> Vec<(PeerAddress, TransportError)> {
        let mut failed = Vec::new();
        for Outbound { to, frame } in outbound {
            if let Err(err) = self.send(&to, frame) {
                failed.push((to, err));
            }
        }
        failed
    }
}
