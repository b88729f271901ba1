//! Shared fixtures for the integration tests.
//!
//! `Peer` pairs a coordinator with its `MemoryNetwork` endpoint, and `pump`
//! shuttles frames between peers until the network is quiet.

#![allow(dead_code)]

use ccg_sync::cards::{Card, CardCatalog, CardDefinition, DefinitionId};
use ccg_sync::core::{CardId, PlayerId, PrivateZone, Session, SyncConfig, Timestamp};
use ccg_sync::net::{Envelope, MemoryNetwork, MemoryTransport, Message, PeerAddress, Transport};
use ccg_sync::roles::{SyncCoordinator, SyncEvent};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install a test subscriber once. Level from `TEST_LOG`, then `RUST_LOG`, default `warn`.
pub fn init_logging() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt().with_env_filter(filter).with_test_writer().without_time().try_init().ok();
    });
}

pub const GUEST: PlayerId = PlayerId(2);

pub fn catalog() -> CardCatalog {
    CardCatalog::from_definitions([
        CardDefinition::new(DefinitionId::new(1), "Squire"),
        CardDefinition::new(DefinitionId::new(2), "Knight").with_base_power(3),
        CardDefinition::new(DefinitionId::new(3), "Dragon").with_base_power(7),
    ])
}

/// A card as the catalog would rehydrate it.
pub fn card(origin: PlayerId, serial: u32, owner: PlayerId) -> Card {
    let def = DefinitionId::new(serial % 3 + 1);
    let base = catalog().get(def).map_or(0, |d| d.base_power);
    Card::new(CardId::new(origin, serial), def, owner).with_base_power(base)
}

pub fn config(seed: u64) -> SyncConfig {
    SyncConfig::default().with_seed(seed)
}

pub fn at(ms: u64) -> Timestamp {
    Timestamp::from_millis(ms)
}

/// A coordinator plus its network endpoint.
pub struct Peer {
    pub sync: SyncCoordinator,
    pub link: MemoryTransport,
    /// Every message this peer received, in order.
    pub received: Vec<Message>,
}

impl Peer {
    pub fn new(net: &MemoryNetwork, address: &str, config: SyncConfig) -> Self {
        Self::from_sync(net, address, |addr| SyncCoordinator::new(config, catalog(), addr))
    }

    /// Build the coordinator with a custom constructor (stores, deck backs).
    pub fn from_sync(net: &MemoryNetwork, address: &str, build: impl FnOnce(PeerAddress) -> SyncCoordinator) -> Self {
        init_logging();
        let link = net.endpoint(address);
        let sync = build(link.local_address());
        Self {
            sync,
            link,
            received: Vec::new(),
        }
    }

    pub fn address(&self) -> PeerAddress {
        self.link.local_address()
    }

    pub fn state(&self) -> &Session {
        self.sync.state().expect("peer has a session")
    }

    /// Poll and send. Unreachable peers are reported back. Returns frames sent.
    pub fn flush(&mut self, now: Timestamp) -> usize {
        let outbound = self.sync.poll(now);
        let sent = outbound.len();
        for (address, _) in self.link.send_all(outbound) {
            self.sync.peer_lost(now, &address);
        }
        sent
    }

    /// Handle every waiting frame. Returns frames handled.
    pub fn receive(&mut self, now: Timestamp) -> usize {
        let frames = self.link.drain();
        for (_, bytes) in &frames {
            let envelope = Envelope::decode(bytes).expect("well-formed frame");
            self.received.push(envelope.message);
            self.sync.handle_frame(now, bytes).expect("frame handled");
        }
        frames.len()
    }

    pub fn events(&mut self) -> Vec<SyncEvent> {
        self.sync.drain_events()
    }

    /// Apply a local change to one player.
    pub fn mutate_player(&mut self, now: Timestamp, id: PlayerId, change: impl FnOnce(&mut ccg_sync::core::Player)) {
        self.sync
            .request_mutation(now, |s| {
                let mut next = s.clone();
                change(next.player_mut(id).expect("player exists"));
                next
            })
            .expect("session loaded");
    }

    /// Host: put cards into a player's zone.
    pub fn deal(&mut self, now: Timestamp, to: PlayerId, zone: PrivateZone, cards: &[Card]) {
        self.mutate_player(now, to, |p| {
            for c in cards {
                p.push_card(zone, c.clone());
            }
        });
    }
}

/// Exchange frames until a full round moves nothing.
pub fn pump(now: Timestamp, peers: &mut [&mut Peer]) {
    for _ in 0..32 {
        let mut moved = 0;
        for peer in peers.iter_mut() {
            moved += peer.flush(now);
        }
        for peer in peers.iter_mut() {
            moved += peer.receive(now);
        }
        if moved == 0 {
            return;
        }
    }
    panic!("network did not settle");
}

/// Host at `host-a` with one joined guest at `guest-1`.
pub fn hosted_pair(net: &MemoryNetwork) -> (Peer, Peer) {
    let mut host = Peer::new(net, "host-a", config(1));
    let mut guest = Peer::new(net, "guest-1", config(2));
    host.sync.create_session(at(0), "Ada").expect("fresh coordinator");
    guest.sync.join(at(0), host.address(), "Bea").expect("fresh coordinator");
    pump(at(0), &mut [&mut host, &mut guest]);
    (host, guest)
}
