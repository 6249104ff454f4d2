#![allow(dead_code)]

use futures::future::BoxFuture;
use minecraft_bridge::{
    auth::{CredentialProvider, Credentials, DeviceCode, DeviceCodeFlow},
    backend::{BackendEvent, RelayConnection, RelayConnector},
    bridge::{Bridge, BridgeBuilder},
    config::{AuthType, ProxyConfig},
    error::AuthError,
    frontend::{self, ClientPacket, Form, ServerPacket},
    identity::ClientIdentity,
    link::{ChannelLink, LinkMessage, LinkReceiver},
    protocol::packet::{
        self as java, client,
        server::{self, login::LoginSuccess},
    },
    session::{ExecutionContext, Session},
};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::oneshot;
use uuid::Uuid;

pub const CLIENT_ADDRESS: &str = "127.0.0.1:51000";

/// A session wired to an in-process backend, stepped by hand.
pub struct Harness {
    pub bridge: Arc<Bridge>,
    pub session: Session,
    pub frontend: LinkReceiver<ServerPacket>,
    pub backends: flume::Receiver<RelayConnection>,
}

impl Harness {
    pub fn new(config: ProxyConfig) -> Self {
        Self::with(config, |builder| builder)
    }

    pub fn with(config: ProxyConfig, customize: impl FnOnce(BridgeBuilder) -> BridgeBuilder) -> Self {
        let (relay, backends) = RelayConnector::new();
        let bridge = customize(Bridge::builder(config).relay(relay)).build();
        Self::attach(bridge, backends)
    }

    /// Another connection to an existing bridge.
    pub fn attach(bridge: Arc<Bridge>, backends: flume::Receiver<RelayConnection>) -> Self {
        let address: SocketAddr = CLIENT_ADDRESS.parse().unwrap();
        let (link, frontend) = ChannelLink::new(Some(address));
        let session = Session::new(Arc::clone(&bridge), Box::new(link), ExecutionContext::new());
        Self {
            bridge,
            session,
            frontend,
            backends,
        }
    }

    pub async fn login(&mut self, identity: ClientIdentity) {
        self.session.handle_frontend_packet(ClientPacket::Login(identity));
        self.session.run_until_idle().await;
    }

    /// The backend connection the session opened last.
    pub fn backend(&self) -> RelayConnection {
        self.backends.try_recv().expect("no backend connection was opened")
    }

    pub async fn deliver(&mut self, backend: &RelayConnection, event: BackendEvent) {
        assert!(backend.events.deliver(event));
        self.session.run_until_idle().await;
    }

    pub async fn answer_form(&mut self, form_id: u32, response: Option<usize>) {
        self.session
            .handle_frontend_packet(ClientPacket::ModalFormResponse { form_id, response });
        self.session.run_until_idle().await;
    }

    pub fn frontend_packets(&self) -> Vec<ServerPacket> {
        self.frontend.drain_packets()
    }

    /// Reason of the frontend close, if the session closed it.
    pub fn close_reason(&self) -> Option<String> {
        self.frontend.drain().into_iter().find_map(|message| match message {
            LinkMessage::Close { reason } => Some(reason),
            LinkMessage::Packet { .. } => None,
        })
    }
}

/// Logs `name` in on an offline bridge and lets the backend accept it.
pub async fn spawned(name: &str) -> (Harness, RelayConnection) {
    let mut harness = Harness::new(offline_config());
    harness.login(ClientIdentity::named(name)).await;
    let backend = harness.backend();
    harness.deliver(&backend, login_success(name)).await;
    (harness, backend)
}

pub fn offline_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.remote.auth_type = AuthType::Offline;
    config
}

pub fn online_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.remote.auth_type = AuthType::Online;
    config
}

pub fn login_success(name: &str) -> BackendEvent {
    BackendEvent::Packet(
        server::login::Packet::LoginSuccess(LoginSuccess {
            uuid: Uuid::nil(),
            username: name.to_owned(),
            properties: Vec::new(),
        })
        .into(),
    )
}

pub fn forms(packets: &[ServerPacket]) -> Vec<(u32, Form)> {
    packets
        .iter()
        .filter_map(|packet| match packet {
            ServerPacket::ModalForm { form_id, form } => Some((*form_id, form.clone())),
            _ => None,
        })
        .collect()
}

pub fn position_of(packets: &[ServerPacket], predicate: impl Fn(&ServerPacket) -> bool) -> Option<usize> {
    packets.iter().position(predicate)
}

pub fn is_start_game(packet: &ServerPacket) -> bool {
    matches!(packet, frontend::ServerPacket::StartGame(_))
}

pub fn login_start(packets: &[java::ClientPacket]) -> Option<&client::login::LoginStart> {
    packets.iter().find_map(|packet| match packet {
        java::ClientPacket::Login(client::login::Packet::LoginStart(start)) => Some(start),
        _ => None,
    })
}

pub fn handshake(packets: &[java::ClientPacket]) -> Option<&client::handshake::Handshake> {
    packets.iter().find_map(|packet| match packet {
        java::ClientPacket::Handshake(client::handshake::Packet::Handshake(handshake)) => Some(handshake),
        _ => None,
    })
}

pub fn java_account(name: &str, refresh_token: &str) -> Credentials {
    Credentials {
        name: name.to_owned(),
        uuid: Some(Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0)),
        access_token: Some("access".to_owned()),
        refresh_token: Some(refresh_token.to_owned()),
    }
}

pub fn device_code() -> DeviceCode {
    DeviceCode {
        user_code: "ABCD-1234".to_owned(),
        verification_uri: "https://example.com/link".to_owned(),
        expires_in: Duration::from_secs(900),
    }
}

/// Account service whose answers the test controls.
pub struct ScriptedAccounts {
    refresh: Mutex<Option<Result<Credentials, AuthError>>>,
    completion: Mutex<Option<oneshot::Receiver<Result<Credentials, AuthError>>>>,
    pub device_code_starts: AtomicUsize,
}

impl ScriptedAccounts {
    /// Returns the service and the sender that finishes its device-code
    /// login.
    pub fn new(
        refresh: Result<Credentials, AuthError>,
    ) -> (Arc<Self>, oneshot::Sender<Result<Credentials, AuthError>>) {
        let (finish, completion) = oneshot::channel();
        let accounts = Arc::new(Self {
            refresh: Mutex::new(Some(refresh)),
            completion: Mutex::new(Some(completion)),
            device_code_starts: AtomicUsize::new(0),
        });
        (accounts, finish)
    }

    pub fn starts(&self) -> usize {
        self.device_code_starts.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for ScriptedAccounts {
    fn refresh(&self, _refresh_token: &str) -> BoxFuture<'static, Result<Credentials, AuthError>> {
        let result = self
            .refresh
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(AuthError::Service("refresh called twice".to_owned())));
        Box::pin(async move { result })
    }

    fn start_device_code(&self) -> BoxFuture<'static, Result<DeviceCodeFlow, AuthError>> {
        self.device_code_starts.fetch_add(1, Ordering::SeqCst);
        let completion = self.completion.lock().unwrap().take();
        Box::pin(async move {
            let completion =
                completion.ok_or_else(|| AuthError::Service("device code requested twice".to_owned()))?;
            Ok(DeviceCodeFlow {
                code: device_code(),
                completion: Box::pin(async move { completion.await.unwrap_or(Err(AuthError::Abandoned)) }),
            })
        })
    }
}
