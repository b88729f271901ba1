//! Host address discovery through a shared store.
//!
//! The Host writes `discovery:{id}` on every start and announce tick.
//! Guests learn about a new address either from the store's change
//! notifications or, when the store cannot push, by reading the record on
//! a timer.

use std::sync::mpsc::{Receiver, TryRecvError};

use tracing::debug;

use crate::core::SessionId;
use crate::error::Result;

use super::records::{discovery_key, load, save, DiscoveryRecord};
use super::store::SessionStore;

pub struct Discovery {
    store: Box<dyn SessionStore>,
    watch: Option<Receiver<String>>,
}

impl Discovery {
    /// Subscribe to `store`'s notifications when it offers them.
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        let watch = store.watch();
        Self { store, watch }
    }

    /// Whether changes are pushed (no polling needed).
    #[must_use]
    pub fn is_push(&self) -> bool {
        self.watch.is_some()
    }

    /// Publish the Host's current address.
    pub fn publish(&self, record: &DiscoveryRecord) -> Result<()> {
        save(self.store.as_ref(), &discovery_key(&record.session_id), record)
    }

    /// Read the published address.
    pub fn read(&self, session: &SessionId) -> Result<Option<DiscoveryRecord>> {
        load(self.store.as_ref(), &discovery_key(session))
    }

    /// Drop the published address.
    pub fn clear(&self, session: &SessionId) -> Result<()> {
        self.store.remove(&discovery_key(session))
    }

    /// Drain pushed notifications; true when the session's record changed.
    ///
    /// Always false for polling stores.
    pub fn changed(&mut self, session: &SessionId) -> bool {
        let Some(rx) = self.watch.as_ref() else {
            return false;
        };
        let key = discovery_key(session);
        let mut changed = false;
        loop {
            match rx.try_recv() {
                Ok(k) => changed |= k == key,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("discovery notifications closed, falling back to polling");
                    self.watch = None;
                    break;
                }
            }
        }
        changed
    }
}
