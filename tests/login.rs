mod common;

use common::*;
use minecraft_bridge::{
    auth::{MemoryTokenStore, RefreshTokenStore},
    backend::BackendTarget,
    config::AuthType,
    connection::ConnectionPhase,
    error::AuthError,
    events::{LoginEvent, SessionEvents},
    frontend::{PlayStatus, ServerPacket},
    identity::{offline_uuid, xuid_uuid, ClientIdentity, PassthroughKey},
    protocol::packet::{client, ClientPacket},
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

const XUID: &str = "2535428000000001";

fn xbox_player(name: &str) -> ClientIdentity {
    ClientIdentity {
        xuid: XUID.to_owned(),
        ..ClientIdentity::named(name)
    }
}

#[tokio::test]
async fn offline_login_reaches_spawned() {
    let mut harness = Harness::new(offline_config());
    harness.login(ClientIdentity::named("Steve")).await;

    assert_eq!(harness.session.phase(), ConnectionPhase::ConnectingDownstream);
    let frontend = harness.frontend_packets();
    assert!(matches!(
        frontend.first(),
        Some(ServerPacket::PlayStatus(PlayStatus::LoginSuccess))
    ));

    let backend = harness.backend();
    assert_eq!(
        backend.target,
        BackendTarget {
            address: "127.0.0.1".to_owned(),
            port: 25565,
        }
    );
    let sent = backend.packets.drain_packets();
    let handshakes = sent
        .iter()
        .filter(|packet| matches!(packet, ClientPacket::Handshake(_)))
        .count();
    assert_eq!(handshakes, 1);
    let start = login_start(&sent).expect("login start");
    assert_eq!(start.name, "Steve");
    assert_eq!(start.uuid, offline_uuid("Steve"));

    harness.deliver(&backend, login_success("Steve")).await;
    assert_eq!(harness.session.phase(), ConnectionPhase::Spawned);
    assert!(harness.session.connection().is_logged_in());
    assert!(harness.session.ticker().is_running());
    assert_eq!(harness.session.player().uuid, offline_uuid("Steve"));
    assert!(harness.frontend_packets().iter().any(is_start_game));

    let sent = backend.packets.drain_packets();
    assert!(matches!(
        sent.first(),
        Some(ClientPacket::Login(client::login::Packet::LoginAcknowledged(_)))
    ));
    assert!(sent.iter().any(|packet| matches!(
        packet,
        ClientPacket::Configuration(client::configuration::Packet::ClientInformation(information))
            if information.locale == "en_us"
    )));
}

#[tokio::test]
async fn second_login_packet_is_ignored() {
    let mut harness = Harness::new(offline_config());
    harness.login(ClientIdentity::named("Steve")).await;
    harness.login(ClientIdentity::named("Alex")).await;

    assert_eq!(harness.session.display_name(), "Steve");
    assert_eq!(harness.backends.len(), 1);
}

#[tokio::test]
async fn passthrough_handshake_carries_sealed_identity() {
    let mut config = offline_config();
    config.remote.auth_type = AuthType::Passthrough;
    let key = PassthroughKey::from_bytes(&[7; 32]).unwrap();
    let mut harness = Harness::with(config, |builder| builder.passthrough_key(key.clone()));

    harness.login(xbox_player("Steve")).await;
    let backend = harness.backend();
    let sent = backend.packets.drain_packets();
    let handshake = handshake(&sent).expect("handshake");
    let (host, sealed) = handshake
        .server_address
        .split_once('\0')
        .expect("sealed identity after the host");
    assert_eq!(host, "127.0.0.1");

    let payload = key.open(sealed).unwrap();
    assert_eq!(payload.name, "Steve");
    assert_eq!(payload.xuid, XUID);
    assert_eq!(payload.ip, "127.0.0.1");

    // The backend does not know the player's id; it is derived from the xuid.
    harness.deliver(&backend, login_success("Steve")).await;
    assert_eq!(harness.session.player().uuid, xuid_uuid(XUID));
}

#[tokio::test]
async fn passthrough_without_key_disconnects() {
    let mut config = offline_config();
    config.remote.auth_type = AuthType::Passthrough;
    let mut harness = Harness::new(config);

    harness.login(ClientIdentity::named("Steve")).await;
    assert!(harness.session.is_closed());
    assert!(harness.close_reason().is_some());
}

struct Redirect;

impl SessionEvents for Redirect {
    fn on_login(&self, event: &mut LoginEvent) {
        event.target.port = 25566;
    }
}

struct Refuse;

impl SessionEvents for Refuse {
    fn on_login(&self, event: &mut LoginEvent) {
        event.cancel("");
    }
}

#[tokio::test]
async fn login_event_can_redirect() {
    let mut harness = Harness::with(offline_config(), |builder| builder.events(Arc::new(Redirect)));
    harness.login(ClientIdentity::named("Steve")).await;

    assert_eq!(harness.backend().target.port, 25566);
    assert_eq!(harness.session.backend_target().map(|target| target.port), Some(25566));
}

#[tokio::test]
async fn cancelled_login_never_reaches_the_backend() {
    let mut harness = Harness::with(offline_config(), |builder| builder.events(Arc::new(Refuse)));
    harness.login(ClientIdentity::named("Steve")).await;

    assert!(harness.session.is_closed());
    assert!(harness.backends.is_empty());
    assert_eq!(harness.close_reason().as_deref(), Some("Your login was cancelled."));
}

#[tokio::test]
async fn stored_refresh_token_logs_in() {
    let tokens = Arc::new(MemoryTokenStore::default());
    tokens.store(XUID, "old".to_owned());
    let (accounts, _finish) = ScriptedAccounts::new(Ok(java_account("Notch", "new")));

    let store = Arc::clone(&tokens);
    let provider = Arc::clone(&accounts);
    let mut harness = Harness::with(online_config(), move |builder| {
        builder.refresh_tokens(store).credentials(provider)
    });
    harness.login(xbox_player("Steve")).await;

    assert_eq!(harness.session.phase(), ConnectionPhase::ConnectingDownstream);
    assert_eq!(tokens.get(XUID).as_deref(), Some("new"));
    assert_eq!(accounts.starts(), 0);

    let sent = harness.backend().packets.drain_packets();
    let start = login_start(&sent).expect("login start");
    assert_eq!(start.name, "Notch");
    assert_eq!(Some(start.uuid), java_account("Notch", "new").uuid);
}

#[tokio::test]
async fn rejected_refresh_token_spawns_then_prompts() {
    let tokens = Arc::new(MemoryTokenStore::default());
    tokens.store(XUID, "old".to_owned());
    let (accounts, _finish) = ScriptedAccounts::new(Err(AuthError::TokenRejected("expired".to_owned())));

    let store = Arc::clone(&tokens);
    let mut harness = Harness::with(online_config(), move |builder| {
        builder.refresh_tokens(store).credentials(accounts)
    });
    harness.login(xbox_player("Steve")).await;

    assert_eq!(harness.session.phase(), ConnectionPhase::Spawned);
    assert!(tokens.get(XUID).is_none());
    assert!(harness.backends.is_empty());

    let packets = harness.frontend_packets();
    let start_game = position_of(&packets, is_start_game).expect("start game");
    let form_at = position_of(&packets, |packet| matches!(packet, ServerPacket::ModalForm { .. }))
        .expect("prompt");
    assert!(start_game < form_at);

    let (form_id, form) = forms(&packets).remove(0);
    assert_eq!(form.buttons, ["Sign in again", "Disconnect"]);

    harness.answer_form(form_id, Some(1)).await;
    assert!(harness.session.is_closed());
    assert_eq!(harness.close_reason().as_deref(), Some("Your login was cancelled."));
}

#[tokio::test]
async fn retrying_after_rejected_token_starts_device_code() {
    let tokens = Arc::new(MemoryTokenStore::default());
    tokens.store(XUID, "old".to_owned());
    let (accounts, finish) = ScriptedAccounts::new(Err(AuthError::TokenRejected("expired".to_owned())));

    let store = Arc::clone(&tokens);
    let provider = Arc::clone(&accounts);
    let mut harness = Harness::with(online_config(), move |builder| {
        builder.refresh_tokens(store).credentials(provider)
    });
    harness.login(xbox_player("Steve")).await;
    let (form_id, _) = forms(&harness.frontend_packets()).remove(0);

    harness.answer_form(form_id, Some(0)).await;
    assert_eq!(harness.session.phase(), ConnectionPhase::Authenticating);
    assert_eq!(accounts.starts(), 1);
    let code_form = forms(&harness.frontend_packets())
        .into_iter()
        .map(|(_, form)| form)
        .find(|form| form.content.contains("ABCD-1234"));
    assert!(code_form.is_some());

    finish.send(Ok(java_account("Notch", "fresh"))).unwrap();
    harness.session.run_until_idle().await;
    assert_eq!(harness.session.phase(), ConnectionPhase::ConnectingDownstream);
    assert_eq!(tokens.get(XUID).as_deref(), Some("fresh"));
}

#[tokio::test]
async fn device_code_login_connects_once_signed_in() {
    let tokens = Arc::new(MemoryTokenStore::default());
    let (accounts, finish) = ScriptedAccounts::new(Err(AuthError::Service("unused".to_owned())));

    let store = Arc::clone(&tokens);
    let mut harness = Harness::with(online_config(), move |builder| {
        builder.refresh_tokens(store).credentials(accounts)
    });
    harness.login(xbox_player("Steve")).await;

    assert_eq!(harness.session.phase(), ConnectionPhase::Authenticating);
    assert_eq!(harness.bridge.pending_authentications().len(), 1);
    let keep_alive = || client::play::Packet::KeepAlive(client::play::KeepAlive { id: 1 });
    assert!(!harness.session.send_backend_game(keep_alive()));
    assert!(!harness
        .session
        .send_backend(keep_alive(), ConnectionPhase::Authenticating));
    assert!(harness.backends.is_empty());
    let packets = harness.frontend_packets();
    assert!(packets
        .iter()
        .any(|packet| matches!(packet, ServerPacket::SetTime { time: 16000 })));
    let (_, form) = forms(&packets).remove(0);
    assert_eq!(
        form.content,
        "Go to https://example.com/link and enter the code ABCD-1234"
    );

    finish.send(Ok(java_account("Notch", "fresh"))).unwrap();
    harness.session.run_until_idle().await;

    assert_eq!(harness.session.phase(), ConnectionPhase::ConnectingDownstream);
    assert!(harness.bridge.pending_authentications().is_empty());
    assert_eq!(tokens.get(XUID).as_deref(), Some("fresh"));
    let sent = harness.backend().packets.drain_packets();
    assert_eq!(login_start(&sent).map(|start| start.name.as_str()), Some("Notch"));
}

#[tokio::test]
async fn closing_the_code_form_shows_it_again() {
    let (accounts, _finish) = ScriptedAccounts::new(Err(AuthError::Service("unused".to_owned())));
    let mut harness = Harness::with(online_config(), move |builder| builder.credentials(accounts));
    harness.login(xbox_player("Steve")).await;
    let (form_id, form) = forms(&harness.frontend_packets()).remove(0);

    harness.answer_form(form_id, None).await;
    let shown_again = forms(&harness.frontend_packets());
    assert_eq!(shown_again.len(), 1);
    assert_eq!(shown_again[0].1, form);
    assert!(!harness.session.is_closed());
}

#[tokio::test]
async fn device_code_login_survives_reconnect() {
    let (accounts, finish) = ScriptedAccounts::new(Err(AuthError::Service("unused".to_owned())));
    let provider = Arc::clone(&accounts);
    let mut first = Harness::with(online_config(), move |builder| builder.credentials(provider));
    first.login(xbox_player("Steve")).await;
    assert_eq!(forms(&first.frontend_packets()).len(), 1);

    first.session.disconnect("Disconnected by client");
    let pending = first.bridge.pending_authentications();
    let task = pending.get(XUID).expect("login stays pending");
    assert!(!task.is_online());

    let mut second = Harness::attach(Arc::clone(&first.bridge), first.backends.clone());
    second.login(xbox_player("Steve")).await;
    assert!(task.is_online());
    assert_eq!(accounts.starts(), 1);
    let (_, form) = forms(&second.frontend_packets()).remove(0);
    assert!(form.content.contains("ABCD-1234"));

    finish.send(Ok(java_account("Notch", "fresh"))).unwrap();
    second.session.run_until_idle().await;
    assert_eq!(second.session.phase(), ConnectionPhase::ConnectingDownstream);
    assert!(second.bridge.pending_authentications().is_empty());
}

#[tokio::test]
async fn unfinished_device_code_login_times_out() {
    let (accounts, finish) = ScriptedAccounts::new(Err(AuthError::Service("unused".to_owned())));
    let mut harness = Harness::with(online_config(), move |builder| builder.credentials(accounts));
    harness.login(xbox_player("Steve")).await;

    let pending = harness.bridge.pending_authentications();
    let later = Instant::now() + pending.timeout() + Duration::from_secs(1);
    assert_eq!(pending.sweep(later), 1);
    harness.session.run_until_idle().await;

    assert!(harness.session.is_closed());
    assert!(harness.bridge.pending_authentications().is_empty());
    // The account service's sign-in future was dropped with the flow.
    assert!(finish.is_closed());
    assert_eq!(
        harness.close_reason().as_deref(),
        Some("You did not sign in in time.")
    );
}

#[tokio::test]
async fn account_without_java_profile_is_refused() {
    let (accounts, finish) = ScriptedAccounts::new(Err(AuthError::Service("unused".to_owned())));
    let mut harness = Harness::with(online_config(), move |builder| builder.credentials(accounts));
    harness.login(xbox_player("Steve")).await;

    finish.send(Err(AuthError::NoProfile)).unwrap();
    harness.session.run_until_idle().await;

    assert!(harness.session.is_closed());
    assert_eq!(
        harness.close_reason().as_deref(),
        Some("This Microsoft account does not own Minecraft: Java Edition.")
    );
}
