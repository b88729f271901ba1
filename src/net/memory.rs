//! In-process transport.
//!
//! Every endpoint registered on a `MemoryNetwork` gets an inbox. Sending
//! pushes onto the recipient's inbox; nothing is delivered until the
//! recipient drains it. Links can be cut to simulate a dropped peer, and
//! frames can be duplicated to exercise de-duplication.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::TransportError;

use super::address::PeerAddress;
use super::transport::Transport;

#[derive(Default)]
struct Inner {
    inboxes: FxHashMap<PeerAddress, VecDeque<(PeerAddress, Vec<u8>)>>,
    duplicate_next: usize,
}

/// Shared in-memory network.
#[derive(Clone)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<Inner>>,
    max_payload: usize,
}

impl MemoryNetwork {
    /// Create a network whose links accept frames up to `max_payload` bytes.
    #[must_use]
    pub fn new(max_payload: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_payload,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an endpoint and return its transport.
    pub fn endpoint(&self, address: impl Into<String>) -> MemoryTransport {
        let address = PeerAddress::new(address);
        self.lock().inboxes.entry(address.clone()).or_default();
        MemoryTransport {
            network: self.clone(),
            address,
        }
    }

    /// Remove an endpoint; frames addressed to it now fail as unreachable.
    pub fn disconnect(&self, address: &PeerAddress) {
        self.lock().inboxes.remove(address);
    }

    /// Deliver each of the next `count` frames twice.
    pub fn duplicate_next(&self, count: usize) {
        self.lock().duplicate_next = count;
    }

    /// Number of frames waiting for `address`.
    #[must_use]
    pub fn pending(&self, address: &PeerAddress) -> usize {
        self.lock().inboxes.get(address).map_or(0, VecDeque::len)
    }
}

/// One endpoint of a `MemoryNetwork`.
#[derive(Clone)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    address: PeerAddress,
}

impl MemoryTransport {
    /// Take every frame waiting for this endpoint, oldest first.
    pub fn drain(&self) -> Vec<(PeerAddress, Vec<u8>)> {
        self.network
            .lock()
            .inboxes
            .get_mut(&self.address)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }
}

impl Transport for MemoryTransport {
    fn local_address(&self) -> PeerAddress {
        self.address.clone()
    }

    fn send(&mut self, to: &PeerAddress, frame: Vec<u8>) -> Result<(), TransportError> {
        let max = self.network.max_payload;
        if frame.len() > max {
            return Err(TransportError::FrameTooLarge { size: frame.len(), max });
        }
        let mut inner = self.network.lock();
        let duplicate = inner.duplicate_next > 0;
        if duplicate {
            inner.duplicate_next -= 1;
        }
        let inbox = inner
            .inboxes
            .get_mut(to)
            .ok_or_else(|| TransportError::Unreachable(to.clone()))?;
        trace!(from = %self.address, %to, bytes = frame.len(), "memory send");
        if duplicate {
            inbox.push_back((self.address.clone(), frame.clone()));
        }
        inbox.push_back((self.address.clone(), frame));
        Ok(())
    }

    fn max_payload(&self) -> usize {
        self.network.max_payload
    }
}
