//! Host/guest session flows over the in-memory network.

mod common;

use ccg_sync::core::{CellPos, Phase, PlayerId, PrivateZone};
use ccg_sync::net::{Envelope, MemoryNetwork, Message, RejectReason, Transport};
use ccg_sync::privacy::{BoardCards, ZoneView};
use ccg_sync::roles::{ConnectionStatus, Role, SyncEvent};
use ccg_sync::zones::{MoveOutcome, MoveRequest};
use ccg_sync::SyncError;
use common::*;

const HOST: PlayerId = PlayerId::HOST;

#[test]
fn test_join_assigns_id_and_connects() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);

    assert_eq!(guest.sync.role(), Role::Guest);
    assert_eq!(guest.sync.status(), ConnectionStatus::Connected);
    assert_eq!(guest.sync.local_player(), Some(GUEST));
    assert_eq!(guest.state().session_id, host.state().session_id);
    assert_eq!(guest.state().players.len(), 2);
    assert!(host.state().player(GUEST).unwrap().is_connected);

    assert!(host.events().contains(&SyncEvent::PlayerJoined(GUEST)));
    let events = guest.events();
    assert!(events.contains(&SyncEvent::StatusChanged(ConnectionStatus::Connecting)));
    assert!(events.contains(&SyncEvent::StatusChanged(ConnectionStatus::Connected)));
}

#[test]
fn test_join_rejected_when_full() {
    let net = MemoryNetwork::new(16 * 1024);
    let mut host = Peer::new(&net, "host-a", config(1).with_max_players(2));
    let mut first = Peer::new(&net, "guest-1", config(2));
    let mut second = Peer::new(&net, "guest-2", config(3));

    host.sync.create_session(at(0), "Ada").unwrap();
    first.sync.join(at(0), host.address(), "Bea").unwrap();
    pump(at(0), &mut [&mut host, &mut first]);
    second.sync.join(at(10), host.address(), "Cy").unwrap();
    pump(at(10), &mut [&mut host, &mut first, &mut second]);

    assert_eq!(second.sync.role(), Role::Unassigned);
    assert!(second.sync.state().is_none());
    assert!(second.events().contains(&SyncEvent::JoinRejected(RejectReason::SessionFull)));
    assert_eq!(host.state().players.len(), 2);

    assert!(matches!(host.sync.add_bot(at(20), "Bot"), Err(SyncError::SessionFull { max: 2 })));
}

#[test]
fn test_role_assigned_once() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);

    assert!(matches!(
        host.sync.create_session(at(1), "Again"),
        Err(SyncError::RoleAlreadyAssigned { current: Role::Host })
    ));
    assert!(matches!(
        guest.sync.join(at(1), host.address(), "Again"),
        Err(SyncError::RoleAlreadyAssigned { current: Role::Guest })
    ));
    assert!(matches!(guest.sync.add_bot(at(1), "Bot"), Err(SyncError::WrongRole { .. })));
}

#[test]
fn test_host_changes_reach_guest() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);

    host.sync
        .request_mutation(at(100), |s| {
            let mut next = s.clone();
            next.phase = Phase::Main;
            next.advance_turn(GUEST);
            next
        })
        .unwrap();
    pump(at(100), &mut [&mut host, &mut guest]);

    assert_eq!(guest.state().phase, Phase::Main);
    assert_eq!(guest.state().turn_number, 2);
    assert_eq!(guest.state().active_player, Some(GUEST));
}

#[test]
fn test_guest_move_reaches_host_and_other_guests() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut first) = hosted_pair(&net);
    let mut second = Peer::new(&net, "guest-2", config(3));
    second.sync.join(at(10), host.address(), "Cy").unwrap();
    pump(at(10), &mut [&mut host, &mut first, &mut second]);
    assert_eq!(first.state().players.len(), 3);

    let dealt = [card(HOST, 1, GUEST), card(HOST, 2, GUEST)];
    host.deal(at(20), GUEST, PrivateZone::Hand, &dealt);
    pump(at(20), &mut [&mut host, &mut first, &mut second]);
    assert_eq!(first.state().player(GUEST).unwrap().hand.len(), 2);

    let target = CellPos::new(0, 0);
    let request = MoveRequest::zone_to_board(dealt[0].id, GUEST, PrivateZone::Hand, target);
    assert_eq!(first.sync.move_card(at(30), &request).unwrap(), MoveOutcome::Moved);
    pump(at(30), &mut [&mut host, &mut first, &mut second]);

    for peer in [&host, &first, &second] {
        assert_eq!(peer.state().board.get(target).map(|c| c.id), Some(dealt[0].id));
        assert_eq!(peer.state().player(GUEST).unwrap().sizes.hand, 1);
    }
    assert_eq!(host.state().player(GUEST).unwrap().hand.len(), 1);
    assert!(second.state().player(GUEST).unwrap().hand.is_empty());
}

#[test]
fn test_duplicate_delivery_moves_once() {
    let net = MemoryNetwork::new(16 * 1024);
    let c123 = card(HOST, 123, HOST);
    let from = CellPos::new(1, 1);
    let to = CellPos::new(2, 2);

    let mut host = Peer::new(&net, "host-a", config(1));
    let mut guest = Peer::new(&net, "guest-1", config(2));
    host.sync.create_session(at(0), "Ada").unwrap();
    host.sync
        .request_mutation(at(0), |s| {
            let mut next = s.clone();
            next.board.set(from, Some(c123.clone()));
            next.player_mut(HOST).unwrap().score = 3;
            next
        })
        .unwrap();
    guest.sync.join(at(0), host.address(), "Bea").unwrap();
    pump(at(0), &mut [&mut host, &mut guest]);
    assert_eq!(guest.state().board.get(from).map(|c| c.id), Some(c123.id));

    let request = MoveRequest::board_to_board(c123.id, HOST, from, to);
    host.sync.move_card(at(100), &request).unwrap();
    host.mutate_player(at(100), HOST, |p| p.score += 2);
    net.duplicate_next(2);
    pump(at(100), &mut [&mut host, &mut guest]);
    pump(at(600), &mut [&mut host, &mut guest]);

    let board = &guest.state().board;
    assert!(board.get(from).is_none());
    assert_eq!(board.get(to).map(|c| c.id), Some(c123.id));
    assert_eq!(board.count(c123.id), 1);
    assert_eq!(guest.state().player(HOST).unwrap().score, 5);

    // A stale replay of the same move is recognised at the source.
    assert_eq!(host.sync.move_card(at(700), &request).unwrap(), MoveOutcome::AlreadyApplied);
}

#[test]
fn test_score_taps_batched_into_one_frame() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);
    host.received.clear();

    for (ms, amount) in [(0, 1), (100, 2), (200, 1)] {
        guest.mutate_player(at(ms), GUEST, |p| p.score += amount);
        pump(at(ms), &mut [&mut host, &mut guest]);
    }
    assert_eq!(guest.state().player(GUEST).unwrap().score, 4);
    assert_eq!(host.state().player(GUEST).unwrap().score, 0);
    assert!(host.received.is_empty());

    pump(at(499), &mut [&mut host, &mut guest]);
    assert!(host.received.is_empty());

    pump(at(500), &mut [&mut host, &mut guest]);
    assert_eq!(host.received.len(), 1);
    match &host.received[0] {
        Message::StateDelta(frame) => {
            assert_eq!(frame.delta.player(GUEST).unwrap().score_delta, Some(4));
        }
        other => panic!("expected a delta, got {}", other.kind()),
    }
    assert_eq!(host.state().player(GUEST).unwrap().score, 4);
}

#[test]
fn test_turn_change_flushes_pending_batch() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);

    host.mutate_player(at(0), HOST, |p| p.score += 3);
    pump(at(0), &mut [&mut host, &mut guest]);
    assert_eq!(guest.state().player(HOST).unwrap().score, 0);

    host.sync
        .request_mutation(at(50), |s| {
            let mut next = s.clone();
            next.advance_turn(GUEST);
            next
        })
        .unwrap();
    pump(at(50), &mut [&mut host, &mut guest]);

    assert_eq!(guest.state().player(HOST).unwrap().score, 3);
    assert_eq!(guest.state().active_player, Some(GUEST));
}

#[test]
fn test_guest_write_to_host_field_is_corrected() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);
    host.mutate_player(at(0), HOST, |p| p.score = 7);
    pump(at(0), &mut [&mut host, &mut guest]);
    pump(at(500), &mut [&mut host, &mut guest]);
    assert_eq!(guest.state().player(HOST).unwrap().score, 7);

    guest.mutate_player(at(1000), HOST, |p| p.score = 99);
    assert_eq!(guest.state().player(HOST).unwrap().score, 99);
    pump(at(1000), &mut [&mut host, &mut guest]);
    pump(at(1500), &mut [&mut host, &mut guest]);

    assert_eq!(host.state().player(HOST).unwrap().score, 7);
    assert_eq!(guest.state().player(HOST).unwrap().score, 7);
    assert!(guest.received.iter().any(|m| matches!(m, Message::StateUpdate { .. })));
}

#[test]
fn test_published_guest_state_keeps_only_board_and_own_zones() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);
    let dealt = card(HOST, 9, GUEST);
    host.deal(at(0), GUEST, PrivateZone::Hand, &[dealt.clone()]);
    pump(at(0), &mut [&mut host, &mut guest]);

    guest
        .sync
        .request_mutation(at(100), |s| {
            let mut next = s.clone();
            let me = next.player_mut(GUEST).unwrap();
            let moved = me.take_card(PrivateZone::Hand, dealt.id);
            me.push_card(PrivateZone::Discard, moved.unwrap());
            next.turn_number = 40;
            next
        })
        .unwrap();
    guest.sync.publish_state(at(100)).unwrap();
    pump(at(100), &mut [&mut host, &mut guest]);

    let theirs = host.state().player(GUEST).unwrap();
    assert!(theirs.hand.is_empty());
    assert_eq!(theirs.discard.iter().map(|c| c.id).collect::<Vec<_>>(), vec![dealt.id]);
    assert_eq!(host.state().turn_number, 40);
}

#[test]
fn test_compact_fallback_under_small_payload_limit() {
    let limit = 1500;
    let net = MemoryNetwork::new(limit);
    let mut host = Peer::new(&net, "host-a", config(1).with_max_payload(limit));
    let mut guest = Peer::new(&net, "guest-1", config(2).with_max_payload(limit));

    host.sync.create_session(at(0), "Ada").unwrap();
    let deck: Vec<_> = (1..=80).map(|serial| card(HOST, serial, HOST)).collect();
    host.deal(at(0), HOST, PrivateZone::Deck, &deck);
    host.flush(at(0));

    guest.sync.join(at(0), host.address(), "Bea").unwrap();
    guest.flush(at(0));
    host.receive(at(0));

    let outbound = host.sync.poll(at(0));
    let accept = outbound.iter().find(|o| o.to == guest.address()).expect("join accept queued");
    assert!(accept.frame.len() <= limit);
    match Envelope::decode(&accept.frame).unwrap().message {
        Message::JoinAccept { view, .. } => {
            assert!(matches!(view.board.cards, BoardCards::Compact(_)));
            assert_eq!(view.player(HOST).unwrap().deck, ZoneView::Hidden { size: 80, placeholders: Vec::new() });
        }
        other => panic!("expected JOIN_ACCEPT, got {}", other.kind()),
    }
    assert!(host.link.send_all(outbound).is_empty());
    pump(at(0), &mut [&mut host, &mut guest]);

    let view_of_host = guest.state().player(HOST).unwrap();
    assert_eq!(view_of_host.sizes.deck, 80);
    assert!(view_of_host.deck.is_empty());
}

#[test]
fn test_bot_cards_are_public() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);
    let bot = host.sync.add_bot(at(10), "Bot").unwrap();
    let cards = [card(HOST, 50, bot), card(HOST, 51, bot)];
    host.deal(at(10), bot, PrivateZone::Hand, &cards);
    pump(at(10), &mut [&mut host, &mut guest]);

    let seen = guest.state().player(bot).unwrap();
    assert!(seen.is_bot);
    assert_eq!(seen.hand.iter().cloned().collect::<Vec<_>>(), cards.to_vec());
}

#[test]
fn test_exit_game_notifies_host() {
    let net = MemoryNetwork::new(16 * 1024);
    let (mut host, mut guest) = hosted_pair(&net);

    guest.sync.exit_game(at(100)).unwrap();
    assert_eq!(guest.sync.role(), Role::Unassigned);
    assert_eq!(guest.sync.status(), ConnectionStatus::Disconnected);
    pump(at(100), &mut [&mut host, &mut guest]);

    assert!(!host.state().player(GUEST).unwrap().is_connected);
    assert!(host.events().contains(&SyncEvent::PlayerLeft(GUEST)));
    assert!(matches!(guest.sync.exit_game(at(200)), Err(SyncError::NoSession)));
}
