mod common;

use common::*;
use minecraft_bridge::{
    backend::BackendEvent,
    bridge::{Bridge, CollisionCheck},
    config::ProxyConfig,
    connection::ConnectionPhase,
    error::{AuthError, BackendFailure},
    events::{DisconnectEvent, SessionEvents},
    identity::ClientIdentity,
    link::LinkMessage,
    listener,
    position::Vec3,
    protocol::packet::{
        client::{configuration, play},
        server, ClientPacket,
    },
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// Lets the backend finish configuration so gameplay packets flow.
async fn playing(name: &str) -> (Harness, minecraft_bridge::backend::RelayConnection) {
    let (mut harness, backend) = spawned(name).await;
    let finish = server::configuration::Packet::FinishConfiguration(
        server::configuration::FinishConfiguration,
    );
    harness
        .deliver(&backend, BackendEvent::Packet(finish.into()))
        .await;
    backend.packets.drain();
    (harness, backend)
}

fn keep_alive() -> play::Packet {
    play::Packet::KeepAlive(play::KeepAlive { id: 7 })
}

fn close_reasons<P>(messages: Vec<LinkMessage<P>>) -> Vec<String> {
    messages
        .into_iter()
        .filter_map(|message| match message {
            LinkMessage::Close { reason } => Some(reason),
            LinkMessage::Packet { .. } => None,
        })
        .collect()
}

fn position_heartbeats(packets: &[ClientPacket]) -> usize {
    packets
        .iter()
        .filter(|packet| matches!(packet, ClientPacket::Play(play::Packet::SetPlayerPosition(_))))
        .count()
}

#[tokio::test]
async fn gameplay_packets_wait_for_spawn() {
    let mut harness = Harness::new(offline_config());
    assert!(!harness.session.send_backend_game(keep_alive()));

    harness.login(ClientIdentity::named("Steve")).await;
    assert_eq!(harness.session.phase(), ConnectionPhase::ConnectingDownstream);
    assert!(!harness.session.send_backend_game(keep_alive()));

    let backend = harness.backend();
    harness.deliver(&backend, login_success("Steve")).await;
    // Spawned, but the backend link is still configuring.
    assert!(!harness.session.send_backend_game(keep_alive()));

    let (harness, backend) = playing("Alex").await;
    assert!(harness.session.send_backend_game(keep_alive()));
    let wrong_phase = configuration::Packet::KeepAlive(configuration::KeepAlive { id: 7 });
    assert!(!harness.session.send_backend_game(wrong_phase));
    assert_eq!(backend.packets.drain_packets().len(), 1);
}

#[tokio::test]
async fn backend_failures_become_readable_reasons() {
    let cases = [
        (BackendFailure::ConnectionRefused, "The server is offline."),
        (
            BackendFailure::UnexpectedEncryption,
            "Could not connect: the server expects a different login type than this proxy is configured for.",
        ),
        (BackendFailure::Kicked("Banned for griefing".to_owned()), "Banned for griefing"),
        (BackendFailure::Closed, "connection closed"),
    ];
    for (failure, expected) in cases {
        let (mut harness, backend) = spawned("Steve").await;
        harness
            .deliver(&backend, BackendEvent::Disconnected(failure))
            .await;

        assert!(harness.session.is_closed());
        assert!(harness.bridge.sessions().is_empty());
        assert_eq!(harness.close_reason().as_deref(), Some(expected));
    }
}

#[tokio::test]
async fn unreachable_backend_is_reported_offline() {
    let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = unused.local_addr().unwrap().port();
    drop(unused);

    let mut config = offline_config();
    config.remote.port = port;
    config.use_direct_connection = false;
    let mut harness = Harness::new(config);
    harness.login(ClientIdentity::named("Steve")).await;
    for _ in 0..100 {
        if harness.session.is_closed() {
            break;
        }
        harness.session.run_until_idle().await;
    }

    assert!(harness.backends.is_empty());
    assert_eq!(harness.close_reason().as_deref(), Some("The server is offline."));
}

#[tokio::test]
async fn teardown_closes_each_link_once() {
    let (mut harness, backend) = spawned("Steve").await;
    backend.packets.drain();
    let handle = harness.session.handle().clone();

    harness.session.disconnect("bye");
    harness.session.disconnect("again");

    assert_eq!(harness.session.phase(), ConnectionPhase::Closed);
    assert!(!harness.session.ticker().is_running());
    assert!(!handle.dispatch(|_| {}));
    assert!(!backend.events.deliver(BackendEvent::Disconnected(BackendFailure::Closed)));

    assert_eq!(close_reasons(harness.frontend.drain()), ["bye"]);
    assert_eq!(close_reasons(backend.packets.drain()), ["bye"]);
}

struct Maintenance;

impl SessionEvents for Maintenance {
    fn on_disconnect(&self, event: &mut DisconnectEvent) {
        event.reason = format!("{} (maintenance)", event.reason);
    }
}

#[tokio::test]
async fn disconnect_event_can_rewrite_the_reason() {
    let mut harness = Harness::with(offline_config(), |builder| builder.events(Arc::new(Maintenance)));
    harness.login(ClientIdentity::named("Steve")).await;

    harness.session.disconnect("Server closed");
    assert_eq!(
        harness.close_reason().as_deref(),
        Some("Server closed (maintenance)")
    );
}

#[tokio::test]
async fn idle_player_sends_position_heartbeat() {
    let (mut harness, backend) = playing("Steve").await;
    let start = Instant::now();
    harness.session.player_mut().spawned = true;
    harness.session.player_mut().last_movement = start;

    harness.session.tick_at(start + Duration::from_secs(1));
    assert_eq!(position_heartbeats(&backend.packets.drain_packets()), 0);

    let due = start + Duration::from_secs(4);
    harness.session.tick_at(due);
    harness.session.tick_at(due + Duration::from_millis(50));
    assert_eq!(position_heartbeats(&backend.packets.drain_packets()), 1);
    assert_eq!(harness.session.player().last_movement, due);
}

struct Midair;

impl CollisionCheck for Midair {
    fn adjust_position(&self, _position: Vec3, _on_ground: bool) -> Option<Vec3> {
        None
    }
}

#[tokio::test]
async fn vetoed_heartbeat_still_resets_the_timer() {
    let mut harness = Harness::with(offline_config(), |builder| builder.collision(Arc::new(Midair)));
    harness.login(ClientIdentity::named("Steve")).await;
    let backend = harness.backend();
    harness.deliver(&backend, login_success("Steve")).await;
    harness
        .deliver(
            &backend,
            BackendEvent::Packet(
                server::configuration::Packet::FinishConfiguration(server::configuration::FinishConfiguration)
                    .into(),
            ),
        )
        .await;
    backend.packets.drain();

    let start = Instant::now();
    harness.session.player_mut().spawned = true;
    harness.session.player_mut().last_movement = start;
    let due = start + Duration::from_secs(4);
    for tick in 0..10 {
        harness.session.tick_at(due + Duration::from_millis(50 * tick));
    }

    assert_eq!(position_heartbeats(&backend.packets.drain_packets()), 0);
    assert_eq!(harness.session.player().last_movement, due);
}

#[tokio::test]
async fn sweeper_expires_forgotten_logins() {
    let mut config = ProxyConfig::default();
    config.pending_authentication_timeout_secs = 0;
    let bridge = Bridge::builder(config).build();
    let (task, _) = bridge
        .pending_authentications()
        .get_or_create("2535428000000001", Instant::now());

    let sweeper = listener::spawn_sweeper(Arc::clone(&bridge));
    tokio::time::sleep(Duration::from_millis(50)).await;
    sweeper.abort();

    assert!(bridge.pending_authentications().is_empty());
    assert!(matches!(task.result(), Some(Err(AuthError::TimedOut))));
}
