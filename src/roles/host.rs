//! Host side of the coordinator.
//!
//! The Host admits guests, issues their peer tokens, sanitizes what they
//! submit and relays accepted changes to everyone else. It remembers each
//! guest by player id together with the address it last used.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::core::{Player, PlayerId, SessionId, Timestamp, ZoneSizes};
use crate::delta::{apply, diff, ApplyContext, PlayerDelta, StateDelta, Viewer};
use crate::error::{Result, SyncError};
use crate::net::{Message, PeerAddress, RejectReason};
use crate::persistence::PeerRecord;
use crate::privacy::{PublicView, ReconnectSnapshot};

use super::authority::{merge_guest_view, sanitize_guest_delta};
use super::coordinator::{RoleState, SyncCoordinator};
use super::{Role, SyncEvent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PeerEntry {
    pub address: PeerAddress,
    pub token: String,
    pub connected: bool,
}

/// Guests known to the Host.
#[derive(Clone, Debug, Default)]
pub(crate) struct HostState {
    peers: BTreeMap<PlayerId, PeerEntry>,
}

impl HostState {
    /// Rebuild from persisted records. Everybody starts disconnected.
    pub fn from_records(records: Vec<PeerRecord>) -> Self {
        let peers = records
            .into_iter()
            .map(|r| {
                let entry = PeerEntry {
                    address: r.address,
                    token: r.token,
                    connected: false,
                };
                (r.player_id, entry)
            })
            .collect();
        Self { peers }
    }

    pub fn records(&self) -> Vec<PeerRecord> {
        self.peers
            .iter()
            .map(|(id, entry)| PeerRecord {
                player_id: *id,
                address: entry.address.clone(),
                token: entry.token.clone(),
            })
            .collect()
    }

    pub fn peer_by_address(&self, address: &PeerAddress) -> Option<PlayerId> {
        self.peers
            .iter()
            .find(|(_, entry)| entry.address == *address)
            .map(|(id, _)| *id)
    }

    pub fn connected_peers(&self) -> impl Iterator<Item = (PlayerId, &PeerAddress)> {
        self.peers
            .iter()
            .filter(|(_, entry)| entry.connected)
            .map(|(id, entry)| (*id, &entry.address))
    }

    pub fn disconnected_peers(&self) -> impl Iterator<Item = &PeerAddress> {
        self.peers
            .values()
            .filter(|entry| !entry.connected)
            .map(|entry| &entry.address)
    }

    /// Mark the guest at `address` disconnected. Returns it if it was connected.
    pub fn mark_lost(&mut self, address: &PeerAddress) -> Option<PlayerId> {
        let (id, entry) = self
            .peers
            .iter_mut()
            .find(|(_, entry)| entry.connected && entry.address == *address)?;
        entry.connected = false;
        Some(*id)
    }
}

fn connection_delta(player: PlayerId, connected: bool) -> StateDelta {
    let mut delta = StateDelta::default();
    delta.push_player(
        player,
        PlayerDelta {
            is_connected: Some(connected),
            ..Default::default()
        },
    );
    delta
}

impl SyncCoordinator {
    fn host_state(&self) -> Option<&HostState> {
        match &self.role {
            RoleState::Host(host) => Some(host),
            _ => None,
        }
    }

    fn host_state_mut(&mut self) -> Option<&mut HostState> {
        match &mut self.role {
            RoleState::Host(host) => Some(host),
            _ => None,
        }
    }

    /// Resolve a sender to a connected guest.
    fn connected_sender(&self, from: &PeerAddress) -> Option<PlayerId> {
        let host = self.host_state()?;
        let id = host.peer_by_address(from)?;
        host.peers.get(&id).is_some_and(|e| e.connected).then_some(id)
    }

    fn set_connected(&mut self, player: PlayerId, connected: bool) {
        for session in [&mut self.state, &mut self.synced].into_iter().flatten() {
            if let Some(p) = session.player_mut(player) {
                p.is_connected = connected;
            }
        }
    }

    /// Send a full `STATE_UPDATE` to every connected guest except `except`.
    pub(super) fn broadcast_views(&mut self, now: Timestamp, except: Option<PlayerId>) -> Result<()> {
        let targets: Vec<(PlayerId, PeerAddress)> = match self.host_state() {
            Some(host) => host
                .connected_peers()
                .filter(|(id, _)| Some(*id) != except)
                .map(|(id, addr)| (id, addr.clone()))
                .collect(),
            None => return Ok(()),
        };
        for (id, to) in targets {
            self.queue_view(now, &to, id, |view| Message::StateUpdate { view })?;
        }
        Ok(())
    }

    /// Add a bot player. Bots' cards are visible to everyone.
    pub fn add_bot(&mut self, now: Timestamp, name: &str) -> Result<PlayerId> {
        self.require_role(Role::Host)?;
        let players = self.state.as_ref().ok_or(SyncError::NoSession)?.players.len();
        if players >= self.config.max_players {
            return Err(SyncError::SessionFull {
                max: self.config.max_players,
            });
        }
        self.settle(now)?;

        let id = self.state.as_ref().ok_or(SyncError::NoSession)?.next_player_id();
        for session in [&mut self.state, &mut self.synced].into_iter().flatten() {
            session.add_player(Player::bot(id, name));
        }
        info!(player = %id, name, "added bot");
        self.broadcast_views(now, None)?;
        self.events.push(SyncEvent::PlayerJoined(id));
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        Ok(id)
    }

    pub(super) fn on_join_request(
        &mut self,
        now: Timestamp,
        from: &PeerAddress,
        name: String,
        deck_back_style: String,
    ) -> Result<()> {
        let (Some(host), Some(state)) = (self.host_state(), self.state.as_ref()) else {
            debug!(%from, "refusing join request, not hosting");
            let reason = RejectReason::NotHost;
            return self.queue(now, from, Message::JoinReject { reason });
        };

        // A repeated request (lost accept or duplicate frame) gets the same answer.
        if let Some(id) = host.peer_by_address(from) {
            let Some(token) = host.peers.get(&id).map(|e| e.token.clone()) else {
                return Ok(());
            };
            debug!(player = %id, %from, "repeating join accept");
            return self.queue_view(now, from, id, |view| Message::JoinAccept {
                player_id: id,
                peer_token: token.clone(),
                view,
            });
        }

        if state.players.len() >= self.config.max_players {
            info!(%from, max = self.config.max_players, "rejecting join, session full");
            return self.queue(
                now,
                from,
                Message::JoinReject {
                    reason: RejectReason::SessionFull,
                },
            );
        }

        self.settle(now)?;
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };
        let id = state.next_player_id();
        let player = Player::new(id, name.clone()).with_deck_back(deck_back_style);
        for session in [&mut self.state, &mut self.synced].into_iter().flatten() {
            session.add_player(player.clone());
        }
        let token = self.rng.peer_token();
        if let Some(host) = self.host_state_mut() {
            host.peers.insert(
                id,
                PeerEntry {
                    address: from.clone(),
                    token: token.clone(),
                    connected: true,
                },
            );
        }
        info!(player = %id, %name, %from, "guest joined");

        self.queue_view(now, from, id, |view| Message::JoinAccept {
            player_id: id,
            peer_token: token.clone(),
            view,
        })?;
        self.broadcast_views(now, Some(id))?;
        self.events.push(SyncEvent::PlayerJoined(id));
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        Ok(())
    }

    pub(super) fn on_guest_delta(&mut self, now: Timestamp, from: &PeerAddress, delta: StateDelta) -> Result<()> {
        let Some(sender) = self.connected_sender(from) else {
            warn!(%from, "dropping delta from unknown or disconnected peer");
            return Ok(());
        };
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };

        let clean = sanitize_guest_delta(&delta, sender, state);
        self.apply_remote(&clean.value);
        self.send_delta(now, &clean.value, Some(sender))?;
        if clean.overridden {
            debug!(player = %sender, "guest delta overridden, sending correction");
            self.settle(now)?;
            self.queue_view(now, from, sender, |view| Message::StateUpdate { view })?;
        }
        if !clean.value.is_empty() {
            self.events.push(SyncEvent::StateChanged);
            self.dirty = true;
        }
        Ok(())
    }

    pub(super) fn on_guest_view(&mut self, now: Timestamp, from: &PeerAddress, view: PublicView) -> Result<()> {
        let Some(sender) = self.connected_sender(from) else {
            warn!(%from, "dropping state update from unknown or disconnected peer");
            return Ok(());
        };
        let (Some(state), Some(synced)) = (self.state.as_ref(), self.synced.as_ref()) else {
            return Ok(());
        };

        let merged = merge_guest_view(state, view, sender, &self.catalog);
        let change = diff(state, &merged.value);
        let ctx = ApplyContext::new(Viewer::Omniscient, &self.catalog);
        self.synced = Some(apply(synced, &change, &ctx));
        self.state = Some(merged.value);

        self.send_delta(now, &change, Some(sender))?;
        if merged.overridden {
            debug!(player = %sender, "guest view overridden, sending correction");
            self.settle(now)?;
            self.queue_view(now, from, sender, |view| Message::StateUpdate { view })?;
        }
        if !change.is_empty() {
            self.events.push(SyncEvent::StateChanged);
            self.dirty = true;
        }
        Ok(())
    }

    pub(super) fn on_reconnect_request(
        &mut self,
        now: Timestamp,
        from: &PeerAddress,
        session_id: &SessionId,
        player_id: PlayerId,
        peer_token: &str,
        cached_sizes: Option<ZoneSizes>,
    ) -> Result<()> {
        let (Some(host), Some(state)) = (self.host_state(), self.state.as_ref()) else {
            debug!(%from, "ignoring reconnect request, not hosting");
            return Ok(());
        };

        let reject = if state.session_id != *session_id {
            Some(RejectReason::UnknownPlayer)
        } else {
            match host.peers.get(&player_id) {
                None => Some(RejectReason::UnknownPlayer),
                Some(entry) if entry.token != peer_token => Some(RejectReason::BadToken),
                Some(_) => None,
            }
        };
        if let Some(reason) = reject {
            info!(player = %player_id, %from, %reason, "rejecting reconnect");
            return self.queue(now, from, Message::JoinReject { reason });
        }

        let was_connected = host.peers.get(&player_id).is_some_and(|e| e.connected);
        self.settle(now)?;
        if let Some(entry) = self.host_state_mut().and_then(|h| h.peers.get_mut(&player_id)) {
            entry.address = from.clone();
            entry.connected = true;
        }
        self.set_connected(player_id, true);
        if !was_connected {
            self.send_delta(now, &connection_delta(player_id, true), Some(player_id))?;
        }

        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };
        let snapshot = ReconnectSnapshot::build(state, player_id, cached_sizes);
        info!(
            player = %player_id,
            %from,
            own_cards = snapshot.own_cards.is_some(),
            "guest reconnected"
        );
        self.queue(now, from, Message::ReconnectSnapshot(snapshot))?;
        self.events.push(SyncEvent::PlayerReconnected(player_id));
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        Ok(())
    }

    pub(super) fn on_guest_leave(&mut self, now: Timestamp, from: &PeerAddress, player_id: PlayerId) -> Result<()> {
        let Some(host) = self.host_state_mut() else {
            return Ok(());
        };
        if host.peer_by_address(from) != Some(player_id) {
            warn!(%from, player = %player_id, "ignoring leave for another player");
            return Ok(());
        }
        host.peers.remove(&player_id);
        self.ledger.forget(from);
        info!(player = %player_id, "guest left");

        self.set_connected(player_id, false);
        self.send_delta(now, &connection_delta(player_id, false), Some(player_id))?;
        self.events.push(SyncEvent::PlayerLeft(player_id));
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        Ok(())
    }
}
