//! Guest side of the coordinator.

use tracing::{debug, info, warn};

use crate::core::{PlayerId, SessionId, Timestamp};
use crate::delta::StateDelta;
use crate::error::Result;
use crate::net::{PeerAddress, RejectReason};
use crate::persistence::session_key;
use crate::privacy::{PublicView, ReconnectSnapshot};
use crate::runtime::Task;

use super::coordinator::{RoleState, SyncCoordinator};
use super::{ConnectionStatus, SyncEvent};

/// What a Guest knows about its Host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GuestState {
    pub host_address: PeerAddress,
    /// Issued by the Host on join, presented on reconnect.
    pub peer_token: Option<String>,
}

impl GuestState {
    pub fn new(host_address: PeerAddress) -> Self {
        Self {
            host_address,
            peer_token: None,
        }
    }
}

impl SyncCoordinator {
    fn from_host(&self, from: &PeerAddress) -> bool {
        match &self.role {
            RoleState::Guest(guest) => guest.host_address == *from,
            _ => false,
        }
    }

    /// Stop every retry and report the session as lost.
    fn abandon(&mut self) -> Result<()> {
        self.scheduler.clear();
        self.reconnect.cancel();
        self.set_status(ConnectionStatus::Disconnected);
        self.events.push(SyncEvent::SessionAbandoned);
        self.clear_reconnect_intent()
    }

    pub(super) fn on_join_accept(
        &mut self,
        now: Timestamp,
        from: &PeerAddress,
        player_id: PlayerId,
        peer_token: String,
        view: PublicView,
    ) -> Result<()> {
        if !self.from_host(from) {
            debug!(%from, "ignoring join accept from a peer that is not our host");
            return Ok(());
        }
        if self.state.is_some() {
            debug!("ignoring repeated join accept");
            return Ok(());
        }
        if let RoleState::Guest(guest) = &mut self.role {
            guest.peer_token = Some(peer_token);
        }
        let session = view.into_session(&self.catalog);
        info!(session = %session.session_id, player = %player_id, "joined session");
        self.install(session, player_id);
        self.set_status(ConnectionStatus::Connected);
        self.schedule_discovery_poll(now);
        self.events.push(SyncEvent::PlayerJoined(player_id));
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        Ok(())
    }

    pub(super) fn on_join_reject(&mut self, from: &PeerAddress, reason: RejectReason) -> Result<()> {
        if !self.from_host(from) {
            debug!(%from, %reason, "ignoring join reject from a peer that is not our host");
            return Ok(());
        }
        self.events.push(SyncEvent::JoinRejected(reason));
        if self.state.is_some() {
            warn!(%reason, "host refused reconnect");
            return self.abandon();
        }
        info!(%reason, "join rejected");
        self.role = RoleState::Unassigned;
        self.set_status(ConnectionStatus::Disconnected);
        Ok(())
    }

    pub(super) fn on_host_delta(&mut self, from: &PeerAddress, delta: StateDelta) -> Result<()> {
        if !self.from_host(from) {
            warn!(%from, "dropping delta from a peer that is not our host");
            return Ok(());
        }
        if self.state.is_none() || delta.is_empty() {
            return Ok(());
        }
        self.apply_remote(&delta);
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        Ok(())
    }

    pub(super) fn on_host_view(&mut self, now: Timestamp, from: &PeerAddress, view: PublicView) -> Result<()> {
        if !self.from_host(from) {
            warn!(%from, "dropping state update from a peer that is not our host");
            return Ok(());
        }
        if self.state.is_none() {
            return Ok(());
        }
        let base = view.into_session(&self.catalog);
        self.rebase(base);
        if self.state != self.synced {
            self.scheduler.schedule(now, Task::FlushOutbox);
        }
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        Ok(())
    }

    pub(super) fn on_reconnect_snapshot(
        &mut self,
        now: Timestamp,
        from: &PeerAddress,
        snapshot: ReconnectSnapshot,
    ) -> Result<()> {
        if !self.from_host(from) {
            warn!(%from, "dropping snapshot from a peer that is not our host");
            return Ok(());
        }
        if self.status == ConnectionStatus::Connected {
            debug!("ignoring repeated reconnect snapshot");
            return Ok(());
        }
        let cache = match (self.synced.as_ref(), self.local_player) {
            (Some(synced), Some(me)) => synced.player(me).cloned(),
            _ => None,
        };
        let base = snapshot.reconcile(cache.as_ref(), &self.catalog);
        self.rebase(base);

        self.reconnect.succeeded();
        self.scheduler.cancel(Task::ReconnectAttempt);
        self.clear_reconnect_intent()?;
        info!(%from, "reconnected to host");
        self.set_status(ConnectionStatus::Connected);

        // Changes made while the link was down go out now.
        self.scheduler.schedule(now, Task::FlushOutbox);
        if let Some(due) = self.batcher.next_due() {
            self.scheduler.schedule(due.max(now), Task::FlushBatch);
        }
        self.schedule_discovery_poll(now);
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        Ok(())
    }

    pub(super) fn on_address_announce(
        &mut self,
        now: Timestamp,
        session_id: &SessionId,
        address: PeerAddress,
    ) -> Result<()> {
        let RoleState::Guest(guest) = &self.role else {
            return Ok(());
        };
        if self.state.as_ref().map(|s| &s.session_id) != Some(session_id) {
            debug!(session = %session_id, "ignoring announce for another session");
            return Ok(());
        }
        if guest.host_address != address {
            return self.host_moved(now, address);
        }
        if self.reconnect.is_pending() {
            self.scheduler.cancel(Task::ReconnectAttempt);
            self.scheduler.schedule(now, Task::ReconnectAttempt);
        }
        Ok(())
    }

    pub(super) fn on_host_leave(&mut self, from: &PeerAddress) -> Result<()> {
        if !self.from_host(from) {
            return Ok(());
        }
        info!(%from, "host ended the session");
        if let (Some(store), Some(state)) = (self.store.as_ref(), self.state.as_ref()) {
            store.remove(&session_key(&state.session_id))?;
        }
        self.abandon()
    }
}
