//! Link loss, host restarts and resuming from persisted records.

mod common;

use std::path::PathBuf;

use ccg_sync::core::{PlayerId, PrivateZone};
use ccg_sync::net::{MemoryNetwork, PeerAddress};
use ccg_sync::persistence::{FileStore, MemoryStore, SessionStore};
use ccg_sync::roles::{ConnectionStatus, ResumeMode, Role, SyncCoordinator, SyncEvent};
use common::*;

const HOST: PlayerId = PlayerId::HOST;

fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ccg-sync-{}-{}", name, std::process::id()))
}

fn deal_two(host: &mut Peer, guest: &mut Peer, now: u64) {
    let cards = [card(HOST, 1, GUEST), card(HOST, 2, GUEST)];
    host.deal(at(now), GUEST, PrivateZone::Hand, &cards);
    pump(at(now), &mut [&mut *host, &mut *guest]);
    assert_eq!(guest.state().player(GUEST).unwrap().hand.len(), 2);
}

#[test]
fn test_reconnect_keeps_cached_cards() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);
    let cards: Vec<_> = (1..=3).map(|s| card(HOST, s, GUEST)).collect();
    host.deal(at(10), GUEST, PrivateZone::Hand, &cards);
    pump(at(10), &mut [&mut host, &mut guest]);

    net.disconnect(&guest.address());
    host.mutate_player(at(20), HOST, |p| p.score += 5);
    pump(at(20), &mut [&mut host, &mut guest]);
    // The batched score hits the dead link.
    pump(at(520), &mut [&mut host, &mut guest]);
    assert!(!host.state().player(GUEST).unwrap().is_connected);
    assert!(host.events().contains(&SyncEvent::PlayerDisconnected(GUEST)));

    guest.sync.peer_lost(at(600), &host.address());
    assert_eq!(guest.sync.status(), ConnectionStatus::Reconnecting { attempt: 0 });
    guest.link = net.endpoint("guest-1");
    pump(at(600), &mut [&mut host, &mut guest]);

    assert_eq!(guest.sync.status(), ConnectionStatus::Connected);
    let me = guest.state().player(GUEST).unwrap();
    assert_eq!(me.hand.iter().map(|c| c.id).collect::<Vec<_>>(), cards.iter().map(|c| c.id).collect::<Vec<_>>());
    assert_eq!(guest.state().player(HOST).unwrap().score, 5);
    assert!(host.state().player(GUEST).unwrap().is_connected);
    assert!(host.events().contains(&SyncEvent::PlayerReconnected(GUEST)));
}

#[test]
fn test_reconnect_gives_up_after_max_wait() {
    let net = MemoryNetwork::new(16 * 1024);
    let (host, mut guest) = hosted_pair(&net);
    net.disconnect(&host.address());
    guest.events();

    guest.sync.peer_lost(at(1000), &host.address());
    for t in (1000..=31_000).step_by(1000) {
        guest.flush(at(t));
    }

    let events = guest.events();
    let attempts = events
        .iter()
        .filter_map(|e| match e {
            SyncEvent::StatusChanged(ConnectionStatus::Reconnecting { attempt }) => Some(*attempt),
            _ => None,
        })
        .max();
    assert_eq!(attempts, Some(15));
    assert!(events.contains(&SyncEvent::SessionAbandoned));
    assert_eq!(guest.sync.status(), ConnectionStatus::Disconnected);
    // Nothing further is scheduled.
    assert_eq!(guest.sync.poll(at(60_000)).len(), 0);
}

#[test]
fn test_host_restart_found_through_pushed_discovery() {
    let net = MemoryNetwork::new(16 * 1024);
    let discovery = MemoryStore::new();
    let host_store = MemoryStore::new();
    let guest_store = MemoryStore::new();

    let with_stores = |store: &MemoryStore, seed| {
        let (store, discovery) = (store.clone(), discovery.clone());
        move |addr| {
            SyncCoordinator::new(config(seed), catalog(), addr)
                .with_store(store)
                .with_discovery(discovery)
        }
    };
    let mut host = Peer::from_sync(&net, "host-a", with_stores(&host_store, 1));
    let mut guest = Peer::from_sync(&net, "guest-1", with_stores(&guest_store, 2));
    host.sync.create_session(at(0), "Ada").unwrap();
    guest.sync.join(at(0), host.address(), "Bea").unwrap();
    pump(at(0), &mut [&mut host, &mut guest]);
    deal_two(&mut host, &mut guest, 10);

    // The host process dies and comes back somewhere else.
    net.disconnect(&host.address());
    drop(host);
    let mut host = Peer::from_sync(&net, "host-b", with_stores(&host_store, 1));
    assert!(host.sync.resume(at(1000), ResumeMode::Resume).unwrap());
    assert_eq!(host.sync.role(), Role::Host);
    assert!(!host.state().player(GUEST).unwrap().is_connected);

    guest.events();
    pump(at(1000), &mut [&mut host, &mut guest]);

    assert!(guest.events().contains(&SyncEvent::HostMoved(PeerAddress::new("host-b"))));
    assert_eq!(guest.sync.status(), ConnectionStatus::Connected);
    assert_eq!(guest.state().player(GUEST).unwrap().hand.len(), 2);
    assert!(host.state().player(GUEST).unwrap().is_connected);
    assert!(guest_store.keys("reconnect:").unwrap().is_empty());

    host.mutate_player(at(1100), HOST, |p| p.score += 3);
    pump(at(1100), &mut [&mut host, &mut guest]);
    pump(at(1600), &mut [&mut host, &mut guest]);
    assert_eq!(guest.state().player(HOST).unwrap().score, 3);
}

#[test]
fn test_host_restart_found_by_polling_file_store() {
    let root = scratch_dir("poll");
    std::fs::remove_dir_all(&root).ok();
    let net = MemoryNetwork::new(16 * 1024);
    let open = |name: &str| FileStore::open(root.join(name)).unwrap();

    let build = |store: FileStore, seed| {
        let discovery = open("shared");
        move |addr| {
            SyncCoordinator::new(config(seed), catalog(), addr)
                .with_store(store)
                .with_discovery(discovery)
        }
    };
    let mut host = Peer::from_sync(&net, "host-a", build(open("host"), 1));
    let mut guest = Peer::from_sync(&net, "guest-1", build(open("guest"), 2));
    host.sync.create_session(at(0), "Ada").unwrap();
    guest.sync.join(at(0), host.address(), "Bea").unwrap();
    pump(at(0), &mut [&mut host, &mut guest]);
    deal_two(&mut host, &mut guest, 10);

    net.disconnect(&host.address());
    drop(host);
    let mut host = Peer::from_sync(&net, "host-b", build(open("host"), 1));
    assert!(host.sync.resume(at(1000), ResumeMode::Resume).unwrap());
    host.flush(at(1000));
    // Lose the direct announce; only the store can tell the guest.
    guest.link.drain();
    pump(at(1000), &mut [&mut host, &mut guest]);
    assert_eq!(guest.sync.status(), ConnectionStatus::Connected);
    assert!(guest.events().iter().all(|e| !matches!(e, SyncEvent::HostMoved(_))));

    pump(at(2000), &mut [&mut host, &mut guest]);
    assert!(guest.events().contains(&SyncEvent::HostMoved(PeerAddress::new("host-b"))));
    assert_eq!(guest.sync.status(), ConnectionStatus::Connected);
    assert_eq!(guest.state().player(GUEST).unwrap().hand.len(), 2);

    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn test_guest_resumes_from_its_record() {
    let net = MemoryNetwork::new(16 * 1024);
    let store = MemoryStore::new();
    let mut host = Peer::new(&net, "host-a", config(1));
    let build = |seed| {
        let store = store.clone();
        move |addr| SyncCoordinator::new(config(seed), catalog(), addr).with_store(store)
    };
    let mut guest = Peer::from_sync(&net, "guest-1", build(2));
    host.sync.create_session(at(0), "Ada").unwrap();
    guest.sync.join(at(0), host.address(), "Bea").unwrap();
    pump(at(0), &mut [&mut host, &mut guest]);
    deal_two(&mut host, &mut guest, 10);

    // The guest process restarts on a new address.
    net.disconnect(&guest.address());
    drop(guest);
    let mut guest = Peer::from_sync(&net, "guest-1b", build(3));
    assert!(guest.sync.resume(at(1000), ResumeMode::Resume).unwrap());
    assert_eq!(guest.sync.role(), Role::Guest);
    assert_eq!(guest.sync.local_player(), Some(GUEST));
    assert!(matches!(guest.sync.status(), ConnectionStatus::Reconnecting { .. }));

    pump(at(1000), &mut [&mut host, &mut guest]);
    assert_eq!(guest.sync.status(), ConnectionStatus::Connected);
    assert_eq!(guest.state().player(GUEST).unwrap().hand.len(), 2);

    // Host traffic now follows the new address.
    host.mutate_player(at(1100), HOST, |p| p.score += 3);
    pump(at(1100), &mut [&mut host, &mut guest]);
    pump(at(1600), &mut [&mut host, &mut guest]);
    assert_eq!(guest.state().player(HOST).unwrap().score, 3);
}

#[test]
fn test_fresh_join_discards_records() {
    let net = MemoryNetwork::new(16 * 1024);
    let store = MemoryStore::new();
    let mut host = Peer::new(&net, "host-a", config(1));
    let mut guest = Peer::from_sync(&net, "guest-1", |addr| {
        SyncCoordinator::new(config(2), catalog(), addr).with_store(store.clone())
    });
    host.sync.create_session(at(0), "Ada").unwrap();
    guest.sync.join(at(0), host.address(), "Bea").unwrap();
    pump(at(0), &mut [&mut host, &mut guest]);
    guest.sync.peer_lost(at(20), &host.address());
    assert_eq!(store.keys("session:").unwrap().len(), 1);
    assert_eq!(store.keys("reconnect:").unwrap().len(), 1);

    let mut fresh = SyncCoordinator::new(config(9), catalog(), PeerAddress::new("guest-2")).with_store(store.clone());
    assert!(!fresh.resume(at(30), ResumeMode::FreshJoin).unwrap());
    assert_eq!(fresh.role(), Role::Unassigned);
    assert!(store.keys("session:").unwrap().is_empty());
    assert!(store.keys("reconnect:").unwrap().is_empty());
    assert!(!fresh.resume(at(40), ResumeMode::Resume).unwrap());
}

#[test]
fn test_expired_record_is_not_resumed() {
    let net = MemoryNetwork::new(16 * 1024);
    let store = MemoryStore::new();
    let mut host = Peer::from_sync(&net, "host-a", |addr| {
        SyncCoordinator::new(config(1), catalog(), addr).with_store(store.clone())
    });
    host.sync.create_session(at(0), "Ada").unwrap();
    host.flush(at(0));
    assert_eq!(store.keys("session:").unwrap().len(), 1);

    let day = 24 * 60 * 60 * 1000;
    let mut late = SyncCoordinator::new(config(1), catalog(), PeerAddress::new("host-b")).with_store(store.clone());
    assert!(!late.resume(at(day + 1), ResumeMode::Resume).unwrap());
    assert_eq!(late.role(), Role::Unassigned);

    let mut early = SyncCoordinator::new(config(1), catalog(), PeerAddress::new("host-c")).with_store(store);
    assert!(early.resume(at(day - 1), ResumeMode::Resume).unwrap());
    assert_eq!(early.role(), Role::Host);
}
