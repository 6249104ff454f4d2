//! Opening the backend connection, the login handshake on it, and the
//! events it produces afterwards.

use super::{ResumeEvent, Session};
use crate::{
    backend::{BackendEvent, BackendEventSink, BackendLink, BackendTarget, ConnectRequest, OnlineLogin},
    config::AuthType,
    connection::ConnectionPhase,
    error::{BackendFailure, LinkError, PassthroughError},
    events::LoginEvent,
    identity::{offline_uuid, xuid_uuid, ClientIdentity, PassthroughPayload},
    locale::keys,
    protocol::{
        packet::{
            client::{configuration, handshake, login, play},
            server, ClientPacket, ServerPacket,
        },
        ProtocolPhase, PROTOCOL_VERSION,
    },
};
use std::sync::Arc;

/// Skin layers shown by default: every bit set.
const ALL_SKIN_PARTS: u8 = 0x7f;
const RIGHT_HAND: i32 = 1;

impl Session {
    /// Opens the backend connection with the credentials resolved so far.
    pub(super) fn connect_downstream(&mut self) {
        let Some(identity) = self.identity.clone() else {
            tracing::error!("Cannot connect without an identity");
            return;
        };
        let remote = &self.bridge.config().remote;
        let mut event = LoginEvent::new(
            identity,
            BackendTarget {
                address: remote.address.clone(),
                port: remote.port,
            },
        );
        self.bridge.events().on_login(&mut event);
        if let Some(reason) = event.cancel_reason() {
            let reason = if reason.is_empty() {
                self.translate(keys::LOGIN_CANCELLED, &[])
            } else {
                reason.to_owned()
            };
            self.disconnect(&reason);
            return;
        }

        if !self.set_phase(ConnectionPhase::ConnectingDownstream) {
            return;
        }
        let target = event.target;
        self.backend_target = Some(target.clone());
        let generation = self.connection.next_link_generation();
        tracing::debug!(
            "Connecting {} to {}:{} (link {generation})",
            self.display_name(),
            target.address,
            target.port
        );

        let online = match (self.bridge.config().remote.auth_type, self.connection.credentials()) {
            (AuthType::Online, Some(credentials)) => Some(OnlineLogin {
                credentials: credentials.clone(),
                provider: Arc::clone(self.bridge.credentials()),
            }),
            _ => None,
        };
        let connect = self.bridge.connector().connect(ConnectRequest {
            target,
            events: BackendEventSink::new(self.handle.clone(), generation),
            online,
        });
        self.spawn_resume(async move {
            ResumeEvent::BackendLinkOpened {
                generation,
                result: connect.await,
            }
        });
    }

    pub(super) fn on_backend_link(&mut self, generation: u64, result: Result<BackendLink, LinkError>) {
        if generation != self.connection.link_generation() {
            if let Ok(link) = result {
                link.close("superseded");
            }
            return;
        }
        match result {
            Ok(link) => {
                self.backend = Some(link);
                self.backend_phase = ProtocolPhase::Handshake;
                self.send_login_handshake();
            }
            Err(e) => {
                tracing::warn!("Could not connect {} to the backend: {e}", self.display_name());
                self.handle_backend_failure(BackendFailure::from(e));
            }
        }
    }

    fn send_login_handshake(&mut self) {
        let (Some(identity), Some(target)) = (self.identity.clone(), self.backend_target.clone()) else {
            return;
        };
        let remote = &self.bridge.config().remote;
        let mut host = if remote.forward_host && !identity.server_address.is_empty() {
            identity.requested_host().to_owned()
        } else {
            target.address.clone()
        };

        if remote.auth_type == AuthType::Passthrough {
            match self.seal_identity(&identity) {
                Ok(sealed) => {
                    host.push('\0');
                    host.push_str(&sealed);
                }
                Err(e) => {
                    tracing::error!("Failed to seal identity of {}: {e}", identity.name);
                    let reason = self.translate(keys::ENCRYPTION_FAIL, &[]);
                    self.disconnect(&reason);
                    return;
                }
            }
        }

        self.send_backend(
            handshake::Packet::Handshake(handshake::Handshake {
                protocol_version: PROTOCOL_VERSION,
                server_address: host,
                server_port: target.port,
                next_state: handshake::NextState::Login,
            }),
            ConnectionPhase::ConnectingDownstream,
        );
        self.backend_phase = ProtocolPhase::Login;

        let (name, uuid) = match self.connection.credentials() {
            Some(credentials) => (credentials.name.clone(), credentials.uuid_or_offline()),
            None => (identity.name.clone(), offline_uuid(&identity.name)),
        };
        self.send_backend(
            login::Packet::LoginStart(login::LoginStart { name, uuid }),
            ConnectionPhase::ConnectingDownstream,
        );
    }

    fn seal_identity(&self, identity: &ClientIdentity) -> Result<String, PassthroughError> {
        let key = self.bridge.passthrough_key().ok_or(PassthroughError::MissingKey)?;
        let ip = self
            .frontend
            .remote_address()
            .map(|address| address.ip().to_string())
            .unwrap_or_default();
        key.seal(&PassthroughPayload::new(identity, &ip))
    }

    /// Entry point for everything the backend link reports.
    pub fn handle_backend_event(&mut self, generation: u64, event: BackendEvent) {
        if self.is_closed() {
            return;
        }
        if generation != self.connection.link_generation() {
            tracing::trace!("Ignoring event from replaced backend link {generation}");
            return;
        }
        match event {
            BackendEvent::Packet(packet) => self.handle_backend_packet(packet),
            BackendEvent::PhaseChanged(phase) => {
                tracing::trace!("Backend link of {} is now in {phase}", self.display_name());
                self.backend_phase = phase;
            }
            BackendEvent::Disconnected(failure) => {
                self.backend = None;
                self.handle_backend_failure(failure);
            }
        }
    }

    fn handle_backend_packet(&mut self, packet: ServerPacket) {
        match &packet {
            ServerPacket::Login(server::login::Packet::LoginSuccess(success)) => {
                self.send_backend(
                    login::Packet::LoginAcknowledged(login::LoginAcknowledged),
                    ConnectionPhase::ConnectingDownstream,
                );
                self.backend_phase = ProtocolPhase::Configuration;
                self.on_backend_connected(success);
                return;
            }
            ServerPacket::Login(server::login::Packet::LoginPluginRequest(request)) => {
                self.send_backend(
                    login::Packet::LoginPluginResponse(login::LoginPluginResponse {
                        message_id: request.message_id,
                        successful: false,
                        data: Vec::new(),
                    }),
                    ConnectionPhase::ConnectingDownstream,
                );
                return;
            }
            ServerPacket::Configuration(server::configuration::Packet::FinishConfiguration(_)) => {
                self.send_backend_game(configuration::Packet::FinishConfiguration(
                    configuration::FinishConfiguration,
                ));
                self.backend_phase = ProtocolPhase::Play;
            }
            ServerPacket::Configuration(server::configuration::Packet::KeepAlive(keep_alive)) => {
                self.send_backend_game(configuration::Packet::KeepAlive(configuration::KeepAlive {
                    id: keep_alive.id,
                }));
            }
            ServerPacket::Configuration(server::configuration::Packet::Ping(ping)) => {
                self.send_backend_game(configuration::Packet::Pong(configuration::Pong { id: ping.id }));
            }
            ServerPacket::Play(server::play::Packet::StartConfiguration(_)) => {
                self.send_backend_game(play::Packet::AcknowledgeConfiguration(
                    play::AcknowledgeConfiguration,
                ));
                self.backend_phase = ProtocolPhase::Configuration;
                self.send_client_information();
            }
            ServerPacket::Play(server::play::Packet::KeepAlive(keep_alive)) => {
                self.send_backend_game(play::Packet::KeepAlive(play::KeepAlive { id: keep_alive.id }));
            }
            ServerPacket::Play(server::play::Packet::Ping(ping)) => {
                self.send_backend_game(play::Packet::Pong(play::Pong { id: ping.id }));
            }
            _ => {}
        }

        let translators = Arc::clone(self.bridge.translators());
        for translated in translators.translate_backend(&packet, self) {
            self.send_frontend(translated);
        }
    }

    fn on_backend_connected(&mut self, success: &server::login::LoginSuccess) {
        self.connection.set_logging_in(false);
        self.connection.set_logged_in(true);
        if self.bridge.is_relay_connection() {
            tracing::info!("{} connected to the in-process server", self.display_name());
        } else if let Some(target) = &self.backend_target {
            tracing::info!(
                "{} connected to {}:{}",
                self.display_name(),
                target.address,
                target.port
            );
        }

        // A backend behind an offline-mode proxy may leave the id blank.
        let uuid = if !success.uuid.is_nil() {
            success.uuid
        } else if self.bridge.config().remote.auth_type == AuthType::Passthrough {
            xuid_uuid(self.identity.as_ref().map_or("0", |identity| identity.xuid.as_str()))
        } else {
            offline_uuid(&success.username)
        };
        self.player.uuid = uuid;
        self.player.username = success.username.clone();

        self.ticker.start();
        if !self.set_phase(ConnectionPhase::Spawned) {
            return;
        }
        self.spawn();
        self.send_client_information();
    }

    /// Tells the backend about the client's language and view distance.
    pub fn send_client_information(&mut self) {
        let information = configuration::ClientInformation {
            locale: self.locale().to_owned(),
            view_distance: i8::try_from(self.player.render_distance()).unwrap_or(i8::MAX),
            chat_mode: 0,
            chat_colors: true,
            displayed_skin_parts: ALL_SKIN_PARTS,
            main_hand: RIGHT_HAND,
            text_filtering: false,
            allow_server_listings: true,
        };
        let packet: ClientPacket = match self.backend_phase {
            ProtocolPhase::Configuration => configuration::Packet::ClientInformation(information).into(),
            _ => play::Packet::ClientInformation(information).into(),
        };
        self.send_backend_game(packet);
    }

    /// Turns a backend failure into a reason the player can act on and
    /// tears the session down.
    pub(super) fn handle_backend_failure(&mut self, failure: BackendFailure) {
        self.connection.set_logging_in(false);
        self.connection.set_logged_in(false);
        if !failure.has_cause() {
            if !self.phase().is_terminal() {
                self.disconnect(&failure.to_string());
            }
            return;
        }
        let reason = match &failure {
            BackendFailure::UnexpectedEncryption => {
                if self.bridge.config().remote.auth_type == AuthType::Passthrough {
                    self.translate(keys::PASSTHROUGH_LOGIN_ERROR, &[])
                } else {
                    self.translate(keys::AUTH_TYPE_MISMATCH, &[])
                }
            }
            BackendFailure::ConnectionRefused => self.translate(keys::SERVER_OFFLINE, &[]),
            BackendFailure::Kicked(text) => text.clone(),
            BackendFailure::Protocol(detail) => self.translate(keys::REMOTE_DISCONNECT, &[detail]),
            BackendFailure::Closed => failure.to_string(),
        };
        tracing::info!("{} lost the backend connection: {failure}", self.display_name());
        self.disconnect(&reason);
    }
}
