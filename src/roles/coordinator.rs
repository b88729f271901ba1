//! The synchronization coordinator.
//!
//! `SyncCoordinator` owns the one canonical `Session` of this process and
//! every piece of sync machinery around it. It is sans-IO: callers pass the
//! current time into every entry point, feed received frames to
//! `handle_frame`, and ship whatever `poll` returns.
//!
//! ## Outbound path
//!
//! Local mutations are applied immediately (`request_mutation`) and only
//! diffed at the next `poll`. The diff is taken against `synced`, the last
//! state deltas were generated from, so several mutations within one tick
//! coalesce into a single delta. Score adjustments are handed to the
//! batcher instead of being sent right away.
//!
//! ## Inbound path
//!
//! Remote deltas are applied to both the canonical state and `synced`, so
//! they are never echoed back. Full views (join, corrective update,
//! reconnect snapshot) replace `synced` and the still-unsent local changes
//! are replayed on top.
//!
//! ## Usage
//!
//! ```
//! use ccg_sync::cards::CardCatalog;
//! use ccg_sync::core::{PlayerId, SyncConfig, Timestamp};
//! use ccg_sync::net::PeerAddress;
//! use ccg_sync::roles::{ConnectionStatus, SyncCoordinator};
//!
//! let mut host = SyncCoordinator::new(SyncConfig::default().with_seed(1), CardCatalog::new(), PeerAddress::new("host"));
//! let now = Timestamp::from_millis(0);
//! host.create_session(now, "Ada").unwrap();
//!
//! host.request_mutation(now, |s| {
//!     let mut next = s.clone();
//!     next.player_mut(PlayerId::HOST).unwrap().score += 2;
//!     next
//! })
//! .unwrap();
//!
//! assert_eq!(host.status(), ConnectionStatus::Connected);
//! assert_eq!(host.state().unwrap().player(PlayerId::HOST).unwrap().score, 2);
//! assert!(host.poll(now).is_empty()); // nobody to talk to yet
//! ```

use tracing::{debug, error, info, trace, warn};

use crate::batch::{BatchField, MutationBatcher};
use crate::cards::CardCatalog;
use crate::core::{
    CardId, CardIdAllocator, Player, PlayerId, PrivateZone, Session, SessionId, SessionRng, SyncConfig, Timestamp,
};
use crate::delta::{apply, diff, ApplyContext, StateDelta, Viewer};
use crate::error::{Result, SyncError};
use crate::net::{encode_with_fallback, encode_within, DeltaFrame, Envelope, Message, Outbound, PeerAddress};
use crate::persistence::records::{load, save};
use crate::persistence::{
    reconnect_key, session_key, AttemptDecision, Discovery, DiscoveryRecord, ReconnectIntent, ReconnectManager,
    SessionRecord, SessionStore,
};
use crate::privacy::{project, tailor_delta, PublicView, Recipient};
use crate::runtime::{Scheduler, Task};
use crate::zones::{relocate, MoveOutcome, MoveRequest};

use super::guest::GuestState;
use super::host::HostState;
use super::ledger::DeltaLedger;
use super::{ConnectionStatus, ResumeMode, Role, SyncEvent};

pub(super) enum RoleState {
    Unassigned,
    Host(HostState),
    Guest(GuestState),
}

/// Owner of the canonical session and its synchronization.
pub struct SyncCoordinator {
    pub(super) config: SyncConfig,
    pub(super) catalog: CardCatalog,
    pub(super) address: PeerAddress,
    pub(super) deck_back_style: String,
    pub(super) role: RoleState,

    // === Session ===
    pub(super) state: Option<Session>,
    pub(super) synced: Option<Session>,
    pub(super) local_player: Option<PlayerId>,
    pub(super) allocator: Option<CardIdAllocator>,

    // === Machinery ===
    pub(super) outbox: Vec<Outbound>,
    pub(super) scheduler: Scheduler,
    pub(super) batcher: MutationBatcher,
    pub(super) ledger: DeltaLedger,
    pub(super) reconnect: ReconnectManager,
    pub(super) store: Option<Box<dyn SessionStore>>,
    pub(super) discovery: Option<Discovery>,
    pub(super) rng: SessionRng,
    pub(super) epoch: u64,
    pub(super) next_seq: u64,

    // === Surface ===
    pub(super) status: ConnectionStatus,
    pub(super) events: Vec<SyncEvent>,
    pub(super) dirty: bool,
}

impl SyncCoordinator {
    /// Create an unassigned coordinator reachable at `address`.
    #[must_use]
    pub fn new(config: SyncConfig, catalog: CardCatalog, address: PeerAddress) -> Self {
        let mut rng = SessionRng::from_seed_or_entropy(config.seed);
        let epoch = rng.epoch();
        Self {
            batcher: MutationBatcher::new(config.batch_window),
            reconnect: ReconnectManager::new(config.reconnect_interval, config.reconnect_max_wait),
            config,
            catalog,
            address,
            deck_back_style: "default".to_string(),
            role: RoleState::Unassigned,
            state: None,
            synced: None,
            local_player: None,
            allocator: None,
            outbox: Vec::new(),
            scheduler: Scheduler::new(),
            ledger: DeltaLedger::new(),
            store: None,
            discovery: None,
            rng,
            epoch,
            next_seq: 1,
            status: ConnectionStatus::Disconnected,
            events: Vec::new(),
            dirty: false,
        }
    }

    /// Persist records in `store` and use it as the discovery channel.
    #[must_use]
    pub fn with_store<S: SessionStore + Clone + 'static>(mut self, store: S) -> Self {
        self.discovery = Some(Discovery::new(Box::new(store.clone())));
        self.store = Some(Box::new(store));
        self
    }

    /// Use a separate store as the discovery channel. Call after `with_store`.
    #[must_use]
    pub fn with_discovery<S: SessionStore + 'static>(mut self, store: S) -> Self {
        self.discovery = Some(Discovery::new(Box::new(store)));
        self
    }

    /// Card-back style announced for the local player.
    #[must_use]
    pub fn with_deck_back(mut self, style: impl Into<String>) -> Self {
        self.deck_back_style = style.into();
        self
    }

    // === Accessors ===

    /// The canonical session, if one is loaded.
    #[must_use]
    pub fn state(&self) -> Option<&Session> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn role(&self) -> Role {
        match self.role {
            RoleState::Unassigned => Role::Unassigned,
            RoleState::Host(_) => Role::Host,
            RoleState::Guest(_) => Role::Guest,
        }
    }

    #[must_use]
    pub fn local_player(&self) -> Option<PlayerId> {
        self.local_player
    }

    #[must_use]
    pub fn local_address(&self) -> &PeerAddress {
        &self.address
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.state.as_ref().map(|s| &s.session_id)
    }

    /// When `poll` next has work to do.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Timestamp> {
        self.scheduler.next_due()
    }

    /// Take the events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }

    /// Mint a new card id for a card spawned by this process.
    pub fn allocate_card_id(&mut self) -> Result<CardId> {
        self.allocator
            .as_mut()
            .map(CardIdAllocator::next_id)
            .ok_or(SyncError::NoSession)
    }

    // === Session Lifecycle ===

    /// Become the Host of a new session.
    pub fn create_session(&mut self, now: Timestamp, name: &str) -> Result<SessionId> {
        self.ensure_unassigned()?;
        let session_id = self.rng.session_id();
        let host = Player::new(PlayerId::HOST, name).with_deck_back(self.deck_back_style.clone());
        let session = Session::new(session_id.clone(), host, self.config.board_rows, self.config.board_cols);

        self.role = RoleState::Host(HostState::default());
        self.install(session, PlayerId::HOST);
        self.set_status(ConnectionStatus::Connected);
        self.scheduler.schedule(now, Task::AnnounceAddress);
        self.scheduler.schedule(now.after(self.config.persist_interval), Task::PersistSnapshot);
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        info!(session = %session_id, address = %self.address, "hosting session");
        Ok(session_id)
    }

    /// Become a Guest by asking the Host at `host` to join.
    pub fn join(&mut self, now: Timestamp, host: PeerAddress, name: &str) -> Result<()> {
        self.ensure_unassigned()?;
        let request = Message::JoinRequest {
            name: name.to_string(),
            deck_back_style: self.deck_back_style.clone(),
        };
        self.role = RoleState::Guest(GuestState::new(host.clone()));
        self.set_status(ConnectionStatus::Connecting);
        info!(%host, "joining session");
        self.queue(now, &host, request)
    }

    /// Leave the session: notify peers, cancel retries and delete records.
    pub fn exit_game(&mut self, now: Timestamp) -> Result<()> {
        let state = self.state.take().ok_or(SyncError::NoSession)?;
        let me = self.local_player.unwrap_or(PlayerId::HOST);

        let targets: Vec<PeerAddress> = match &self.role {
            RoleState::Host(host) => host.connected_peers().map(|(_, addr)| addr.clone()).collect(),
            RoleState::Guest(guest) if self.status == ConnectionStatus::Connected => vec![guest.host_address.clone()],
            _ => Vec::new(),
        };
        for to in targets {
            self.queue(now, &to, Message::Leave { player_id: me })?;
        }

        self.scheduler.clear();
        self.reconnect.cancel();
        self.batcher = MutationBatcher::new(self.config.batch_window);
        if let Some(store) = self.store.as_ref() {
            store.remove(&session_key(&state.session_id))?;
            store.remove(&reconnect_key(&state.session_id))?;
        }
        if let (RoleState::Host(_), Some(discovery)) = (&self.role, self.discovery.as_ref()) {
            discovery.clear(&state.session_id)?;
        }

        info!(session = %state.session_id, "left session");
        self.role = RoleState::Unassigned;
        self.synced = None;
        self.local_player = None;
        self.allocator = None;
        self.dirty = false;
        self.set_status(ConnectionStatus::Disconnected);
        self.events.push(SyncEvent::StateChanged);
        Ok(())
    }

    /// Restore the newest persisted session, before any network traffic.
    ///
    /// Returns whether a session was restored. `ResumeMode::FreshJoin`
    /// discards persisted sessions instead.
    pub fn resume(&mut self, now: Timestamp, mode: ResumeMode) -> Result<bool> {
        self.ensure_unassigned()?;
        let Some(store) = self.store.as_ref() else {
            return Ok(false);
        };

        if mode == ResumeMode::FreshJoin {
            for key in store.keys("session:")?.into_iter().chain(store.keys("reconnect:")?) {
                store.remove(&key)?;
            }
            return Ok(false);
        }

        let mut newest: Option<SessionRecord> = None;
        for key in store.keys("session:")? {
            let record = match load::<SessionRecord>(store.as_ref(), &key) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) => {
                    warn!(%key, %err, "skipping unreadable session record");
                    continue;
                }
            };
            if now.since(record.saved_at) >= self.config.retention {
                debug!(%key, "skipping expired session record");
                continue;
            }
            if newest.as_ref().map_or(true, |n| record.saved_at > n.saved_at) {
                newest = Some(record);
            }
        }
        let Some(record) = newest else {
            return Ok(false);
        };

        let session_id = record.session.session_id.clone();
        info!(session = %session_id, role = ?record.role, "resuming session");
        match record.role {
            Role::Host => {
                let mut session = record.session;
                for player in session.players.iter_mut().filter(|p| !p.is_bot && p.id != PlayerId::HOST) {
                    player.is_connected = false;
                }
                self.role = RoleState::Host(HostState::from_records(record.peers));
                self.install(session, record.local_player);
                self.set_status(ConnectionStatus::Connected);
                self.scheduler.schedule(now, Task::AnnounceAddress);
                self.scheduler.schedule(now.after(self.config.persist_interval), Task::PersistSnapshot);
            }
            Role::Guest => {
                let host_address = record.host_address.unwrap_or_else(|| PeerAddress::new(""));
                let mut guest = GuestState::new(host_address);
                guest.peer_token = record.peer_token;
                self.role = RoleState::Guest(guest);
                self.install(record.session, record.local_player);
                self.begin_reconnect(now)?;
                self.check_discovery(now)?;
                self.schedule_discovery_poll(now);
            }
            Role::Unassigned => return Ok(false),
        }
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
        Ok(true)
    }

    // === Mutations ===

    /// Apply a local mutation optimistically and return the new state.
    ///
    /// The change is diffed and sent at the next `poll`.
    pub fn request_mutation(&mut self, now: Timestamp, updater: impl FnOnce(&Session) -> Session) -> Result<&Session> {
        let current = self.state.as_ref().ok_or(SyncError::NoSession)?;
        let next = updater(current);
        if next != *current {
            self.state = Some(next);
            self.touch(now);
        }
        self.state.as_ref().ok_or(SyncError::NoSession)
    }

    /// Guest: send the whole local state to the Host instead of a delta.
    ///
    /// The Host keeps only the board and this player's own zones from it and
    /// answers with a corrective update if it disagreed on anything else.
    pub fn publish_state(&mut self, now: Timestamp) -> Result<()> {
        self.require_role(Role::Guest)?;
        let me = self.local_player.ok_or(SyncError::NoSession)?;
        if self.holding() {
            debug!("link down, state publish deferred to reconnect");
            return Ok(());
        }
        // Score is Host-owned and not taken from views, so it travels as a delta first.
        self.settle(now)?;

        let RoleState::Guest(guest) = &self.role else {
            return Ok(());
        };
        let to = guest.host_address.clone();
        self.queue_view(now, &to, me, |view| Message::StateUpdate { view })
    }

    /// Move a card through `zones::relocate` as a mutation.
    pub fn move_card(&mut self, now: Timestamp, request: &MoveRequest) -> Result<MoveOutcome> {
        let mut outcome = MoveOutcome::AlreadyApplied;
        self.request_mutation(now, |s| {
            let mut next = s.clone();
            outcome = relocate(&mut next, request);
            next
        })?;
        Ok(outcome)
    }

    // === Network Surface ===

    /// Process one received frame.
    pub fn handle_frame(&mut self, now: Timestamp, bytes: &[u8]) -> Result<()> {
        let Envelope { message, sender_id: from, .. } = Envelope::decode(bytes)?;
        trace!(kind = message.kind(), %from, "received frame");

        match message {
            Message::JoinRequest { name, deck_back_style } => self.on_join_request(now, &from, name, deck_back_style),
            Message::JoinAccept {
                player_id,
                peer_token,
                view,
            } => self.on_join_accept(now, &from, player_id, peer_token, view),
            Message::JoinReject { reason } => self.on_join_reject(&from, reason),
            Message::StateDelta(frame) => {
                if !self.ledger.accept(&from, frame.epoch, frame.seq) {
                    debug!(%from, epoch = frame.epoch, seq = frame.seq, "dropping duplicate delta");
                    return Ok(());
                }
                match self.role {
                    RoleState::Host(_) => self.on_guest_delta(now, &from, frame.delta),
                    RoleState::Guest(_) => self.on_host_delta(&from, frame.delta),
                    RoleState::Unassigned => Ok(()),
                }
            }
            Message::StateUpdate { view } => match self.role {
                RoleState::Host(_) => self.on_guest_view(now, &from, view),
                RoleState::Guest(_) => self.on_host_view(now, &from, view),
                RoleState::Unassigned => Ok(()),
            },
            Message::ReconnectRequest {
                session_id,
                player_id,
                peer_token,
                cached_sizes,
            } => self.on_reconnect_request(now, &from, &session_id, player_id, &peer_token, cached_sizes),
            Message::ReconnectSnapshot(snapshot) => self.on_reconnect_snapshot(now, &from, snapshot),
            Message::PeerAddressAnnounce { session_id, address } => {
                self.on_address_announce(now, &session_id, address)
            }
            Message::Leave { player_id } => match self.role {
                RoleState::Host(_) => self.on_guest_leave(now, &from, player_id),
                RoleState::Guest(_) => self.on_host_leave(&from),
                RoleState::Unassigned => Ok(()),
            },
        }
    }

    /// Run due timers and return the frames to send.
    pub fn poll(&mut self, now: Timestamp) -> Vec<Outbound> {
        if self.discovery_changed() {
            if let Err(err) = self.check_discovery(now) {
                warn!(%err, "failed to read discovery record");
            }
        }
        while let Some(task) = self.scheduler.pop_due(now) {
            if let Err(err) = self.run_task(now, task) {
                error!(?task, %err, "scheduled task failed");
            }
        }
        if self.dirty {
            if let Err(err) = self.persist(now) {
                error!(%err, "failed to persist session");
            }
        }
        std::mem::take(&mut self.outbox)
    }

    /// The transport could not reach `address`.
    pub fn peer_lost(&mut self, now: Timestamp, address: &PeerAddress) {
        match &mut self.role {
            RoleState::Host(host) => {
                let Some(id) = host.mark_lost(address) else {
                    return;
                };
                info!(player = %id, %address, "guest unreachable");
                for session in [&mut self.state, &mut self.synced].into_iter().flatten() {
                    if let Some(player) = session.player_mut(id) {
                        player.is_connected = false;
                    }
                }
                let mut delta = StateDelta::default();
                delta.push_player(
                    id,
                    crate::delta::PlayerDelta {
                        is_connected: Some(false),
                        ..Default::default()
                    },
                );
                if let Err(err) = self.send_delta(now, &delta, Some(id)) {
                    warn!(%err, "failed to announce disconnect");
                }
                self.events.push(SyncEvent::PlayerDisconnected(id));
                self.events.push(SyncEvent::StateChanged);
                self.dirty = true;
            }
            RoleState::Guest(guest) => {
                if *address != guest.host_address || self.state.is_none() || self.reconnect.is_pending() {
                    return;
                }
                info!(%address, "lost link to host");
                if let Err(err) = self.begin_reconnect(now) {
                    warn!(%err, "failed to record reconnect intent");
                }
            }
            RoleState::Unassigned => {}
        }
    }

    // === Internals ===

    fn ensure_unassigned(&self) -> Result<()> {
        match self.role {
            RoleState::Unassigned => Ok(()),
            _ => Err(SyncError::RoleAlreadyAssigned { current: self.role() }),
        }
    }

    pub(super) fn require_role(&self, expected: Role) -> Result<()> {
        let actual = self.role();
        if actual == expected {
            Ok(())
        } else {
            Err(SyncError::WrongRole { expected, actual })
        }
    }

    pub(super) fn install(&mut self, session: Session, local: PlayerId) {
        self.allocator = Some(CardIdAllocator::resume_after(local, session.card_ids()));
        self.local_player = Some(local);
        self.synced = Some(session.clone());
        self.state = Some(session);
    }

    pub(super) fn touch(&mut self, now: Timestamp) {
        self.scheduler.schedule(now, Task::FlushOutbox);
        self.events.push(SyncEvent::StateChanged);
        self.dirty = true;
    }

    pub(super) fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            debug!(from = ?self.status, to = ?status, "connection status changed");
            self.status = status;
            self.events.push(SyncEvent::StatusChanged(status));
        }
    }

    pub(super) fn viewer(&self) -> Viewer {
        match (&self.role, self.local_player) {
            (RoleState::Guest(_), Some(me)) => Viewer::Player(me),
            _ => Viewer::Omniscient,
        }
    }

    /// Apply a remote delta to both the canonical and the synced state.
    pub(super) fn apply_remote(&mut self, delta: &StateDelta) {
        let ctx = ApplyContext::new(self.viewer(), &self.catalog);
        self.state = self.state.as_ref().map(|s| apply(s, delta, &ctx));
        self.synced = self.synced.as_ref().map(|s| apply(s, delta, &ctx));
    }

    /// Replace the synced state with `base` and replay unsent local changes.
    pub(super) fn rebase(&mut self, base: Session) {
        let unsent = match (&self.synced, &self.state) {
            (Some(synced), Some(state)) => diff(synced, state),
            _ => StateDelta::default(),
        };
        let ctx = ApplyContext::new(self.viewer(), &self.catalog);
        let batched = self.batcher.pending();
        let synced = if batched.is_empty() { base } else { apply(&base, &batched, &ctx) };
        let state = if unsent.is_empty() {
            synced.clone()
        } else {
            apply(&synced, &unsent, &ctx)
        };
        self.synced = Some(synced);
        self.state = Some(state);
    }

    /// Whether outbound traffic is held back until the link is back.
    fn holding(&self) -> bool {
        matches!(self.role, RoleState::Guest(_)) && self.status != ConnectionStatus::Connected
    }

    pub(super) fn queue(&mut self, now: Timestamp, to: &PeerAddress, message: Message) -> Result<()> {
        let envelope = Envelope::new(message, self.address.clone(), now);
        let frame = encode_within(&envelope, self.config.max_payload_bytes)?;
        trace!(kind = envelope.message.kind(), %to, bytes = frame.len(), "queued frame");
        self.outbox.push(Outbound { to: to.clone(), frame });
        Ok(())
    }

    /// Queue a message carrying `player`'s projection of the state.
    pub(super) fn queue_view(
        &mut self,
        now: Timestamp,
        to: &PeerAddress,
        player: PlayerId,
        make: impl Fn(PublicView) -> Message,
    ) -> Result<()> {
        let state = self.state.as_ref().ok_or(SyncError::NoSession)?;
        let frame = encode_with_fallback(&self.address, now, self.config.max_payload_bytes, |encoding| {
            make(project(state, Recipient::Player(player), encoding))
        })?;
        self.outbox.push(Outbound { to: to.clone(), frame });
        Ok(())
    }

    fn queue_delta(&mut self, now: Timestamp, to: &PeerAddress, delta: StateDelta) -> Result<()> {
        let frame = DeltaFrame {
            epoch: self.epoch,
            seq: self.next_seq,
            delta,
        };
        self.next_seq += 1;
        self.queue(now, to, Message::StateDelta(frame))
    }

    /// Send a delta to the counterpart(s), tailored per recipient.
    pub(super) fn send_delta(&mut self, now: Timestamp, delta: &StateDelta, except: Option<PlayerId>) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        let targets: Vec<(PeerAddress, StateDelta)> = match (&self.role, self.state.as_ref()) {
            (RoleState::Host(host), Some(state)) => host
                .connected_peers()
                .filter(|(id, _)| Some(*id) != except)
                .map(|(id, addr)| (addr.clone(), tailor_delta(delta, state, Recipient::Player(id))))
                .filter(|(_, tailored)| !tailored.is_empty())
                .collect(),
            (RoleState::Guest(guest), Some(_)) => vec![(guest.host_address.clone(), delta.clone())],
            _ => Vec::new(),
        };
        for (to, tailored) in targets {
            self.queue_delta(now, &to, tailored)?;
        }
        Ok(())
    }

    /// Send everything pending, batches included.
    ///
    /// Called before a full view goes out, so no delta already contained in
    /// the view arrives after it.
    pub(super) fn settle(&mut self, now: Timestamp) -> Result<()> {
        self.flush_outbox(now)?;
        let batched = self.batcher.flush_all();
        self.scheduler.cancel(Task::FlushBatch);
        self.send_delta(now, &batched, None)
    }

    /// Diff local changes and send them (zero-delay task).
    pub(super) fn flush_outbox(&mut self, now: Timestamp) -> Result<()> {
        if self.holding() {
            return Ok(());
        }
        let Some(state) = self.state.clone() else {
            return Ok(());
        };
        let mut delta = match self.synced.as_ref() {
            Some(synced) if *synced != state => diff(synced, &state),
            _ => return Ok(()),
        };
        self.synced = Some(state);

        if delta.is_turn_structural() {
            let batched = self.batcher.flush_all();
            self.scheduler.cancel(Task::FlushBatch);
            let mut merged = batched;
            merged.absorb(delta);
            delta = merged;
        } else {
            for (player, amount) in delta.take_scores() {
                self.batcher.push(now, player, BatchField::Score, amount);
            }
            if let Some(due) = self.batcher.next_due() {
                self.scheduler.schedule(due, Task::FlushBatch);
            }
        }
        self.send_delta(now, &delta, None)
    }

    fn flush_batch(&mut self, now: Timestamp) -> Result<()> {
        if self.holding() {
            self.scheduler.schedule(now.after(self.config.batch_window), Task::FlushBatch);
            return Ok(());
        }
        let delta = self.batcher.flush_due(now);
        if let Some(due) = self.batcher.next_due() {
            self.scheduler.schedule(due, Task::FlushBatch);
        }
        self.send_delta(now, &delta, None)
    }

    fn run_task(&mut self, now: Timestamp, task: Task) -> Result<()> {
        match task {
            Task::FlushOutbox => self.flush_outbox(now),
            Task::FlushBatch => self.flush_batch(now),
            Task::AnnounceAddress => self.announce(now),
            Task::PollDiscovery => {
                self.schedule_discovery_poll(now);
                self.check_discovery(now)
            }
            Task::ReconnectAttempt => self.reconnect_attempt(now),
            Task::PersistSnapshot => {
                if matches!(self.role, RoleState::Host(_)) {
                    self.scheduler
                        .schedule(now.after(self.config.persist_interval), Task::PersistSnapshot);
                }
                self.persist(now)
            }
        }
    }

    fn persist(&mut self, now: Timestamp) -> Result<()> {
        self.dirty = false;
        let (Some(store), Some(state), Some(local)) = (self.store.as_ref(), self.state.as_ref(), self.local_player)
        else {
            return Ok(());
        };
        let (peer_token, host_address, peers) = match &self.role {
            RoleState::Host(host) => (None, None, host.records()),
            RoleState::Guest(guest) => (guest.peer_token.clone(), Some(guest.host_address.clone()), Vec::new()),
            RoleState::Unassigned => return Ok(()),
        };
        let record = SessionRecord {
            session: state.clone(),
            role: self.role(),
            local_player: local,
            peer_token,
            host_address,
            peers,
            saved_at: now,
        };
        trace!(session = %state.session_id, "persisting session");
        save(store.as_ref(), &session_key(&state.session_id), &record)
    }

    // === Discovery & Reconnection ===

    fn announce(&mut self, now: Timestamp) -> Result<()> {
        self.scheduler
            .schedule(now.after(self.config.announce_interval), Task::AnnounceAddress);
        let (RoleState::Host(host), Some(state)) = (&self.role, self.state.as_ref()) else {
            return Ok(());
        };
        let session_id = state.session_id.clone();
        if let Some(discovery) = self.discovery.as_ref() {
            discovery.publish(&DiscoveryRecord {
                session_id: session_id.clone(),
                host_address: self.address.clone(),
                announced_at: now,
            })?;
        }
        let targets: Vec<PeerAddress> = host.disconnected_peers().cloned().collect();
        for to in targets {
            let message = Message::PeerAddressAnnounce {
                session_id: session_id.clone(),
                address: self.address.clone(),
            };
            self.queue(now, &to, message)?;
        }
        Ok(())
    }

    fn discovery_changed(&mut self) -> bool {
        let (Some(state), Some(discovery)) = (self.state.as_ref(), self.discovery.as_mut()) else {
            return false;
        };
        // Drained for every role so notifications never pile up.
        let changed = discovery.changed(&state.session_id);
        changed && matches!(self.role, RoleState::Guest(_))
    }

    pub(super) fn schedule_discovery_poll(&mut self, now: Timestamp) {
        let polling = self.discovery.as_ref().is_some_and(|d| !d.is_push());
        if polling && matches!(self.role, RoleState::Guest(_)) && self.state.is_some() {
            self.scheduler
                .schedule(now.after(self.config.discovery_poll_interval), Task::PollDiscovery);
        }
    }

    pub(super) fn check_discovery(&mut self, now: Timestamp) -> Result<()> {
        let (RoleState::Guest(guest), Some(state), Some(discovery)) =
            (&self.role, self.state.as_ref(), self.discovery.as_ref())
        else {
            return Ok(());
        };
        let Some(record) = discovery.read(&state.session_id)? else {
            return Ok(());
        };
        if record.host_address != guest.host_address {
            self.host_moved(now, record.host_address)?;
        }
        Ok(())
    }

    pub(super) fn host_moved(&mut self, now: Timestamp, address: PeerAddress) -> Result<()> {
        let RoleState::Guest(guest) = &mut self.role else {
            return Ok(());
        };
        info!(from = %guest.host_address, to = %address, "host moved");
        guest.host_address = address.clone();
        self.events.push(SyncEvent::HostMoved(address));
        self.dirty = true;
        self.begin_reconnect(now)?;
        // Retry right away against the new address.
        self.scheduler.cancel(Task::ReconnectAttempt);
        self.scheduler.schedule(now, Task::ReconnectAttempt);
        Ok(())
    }

    pub(super) fn begin_reconnect(&mut self, now: Timestamp) -> Result<()> {
        let (RoleState::Guest(guest), Some(state), Some(me)) = (&self.role, self.state.as_ref(), self.local_player)
        else {
            return Ok(());
        };
        let intent = ReconnectIntent {
            session_id: state.session_id.clone(),
            player_id: me,
            host_address: guest.host_address.clone(),
            started_at: now,
        };
        let first = !self.reconnect.is_pending();
        self.reconnect.link_lost(now);
        self.scheduler.schedule(now, Task::ReconnectAttempt);
        if first {
            self.set_status(ConnectionStatus::Reconnecting { attempt: 0 });
            if let Some(store) = self.store.as_ref() {
                save(store.as_ref(), &reconnect_key(&intent.session_id), &intent)?;
            }
        }
        Ok(())
    }

    pub(super) fn clear_reconnect_intent(&self) -> Result<()> {
        match (self.store.as_ref(), self.state.as_ref()) {
            (Some(store), Some(state)) => store.remove(&reconnect_key(&state.session_id)),
            _ => Ok(()),
        }
    }

    fn reconnect_attempt(&mut self, now: Timestamp) -> Result<()> {
        match self.reconnect.on_attempt(now) {
            AttemptDecision::Attempt { attempt, next } => {
                self.set_status(ConnectionStatus::Reconnecting { attempt });
                self.scheduler.schedule(next, Task::ReconnectAttempt);
                let (RoleState::Guest(guest), Some(state), Some(me)) =
                    (&self.role, self.synced.as_ref(), self.local_player)
                else {
                    return Ok(());
                };
                let cached_sizes = state.player(me).and_then(|p| {
                    let known = PrivateZone::ALL
                        .into_iter()
                        .all(|zone| p.zone(zone).len() as u32 == p.zone_size(zone));
                    known.then_some(p.sizes)
                });
                let to = guest.host_address.clone();
                let request = Message::ReconnectRequest {
                    session_id: state.session_id.clone(),
                    player_id: me,
                    peer_token: guest.peer_token.clone().unwrap_or_default(),
                    cached_sizes,
                };
                debug!(attempt, %to, "sending reconnect request");
                self.queue(now, &to, request)
            }
            AttemptDecision::GiveUp => {
                warn!("reconnect budget exhausted, abandoning session");
                self.scheduler.cancel(Task::PollDiscovery);
                self.set_status(ConnectionStatus::Disconnected);
                self.events.push(SyncEvent::SessionAbandoned);
                self.clear_reconnect_intent()
            }
            AttemptDecision::Idle => Ok(()),
        }
    }
}
