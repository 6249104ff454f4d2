//! The backend connection: opening it, and the task that drives the
//! Java protocol on the socket.
//!
//! The session only sees a [`PeerLink`] for sending and a stream of
//! [`BackendEvent`]s for receiving. Framing, compression and encryption
//! stay in the driver task.

use crate::{
    auth::{CredentialProvider, Credentials},
    error::{BackendFailure, LinkError},
    link::{ChannelLink, LinkMessage, LinkReceiver, PeerLink},
    protocol::{
        packet::{
            client,
            server::{configuration, login, play},
            ClientPacket, ServerPacket,
        },
        vanilla_codec::{CompressionThreshold, EncryptionKey, VanillaCodec},
        ProtocolPhase,
    },
    session::SessionHandle,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufWriter},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};

/// Where a session's backend connection goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub address: String,
    pub port: u16,
}

/// Something that happened on the backend connection.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Packet(ServerPacket),
    /// Inbound packets from now on belong to this phase.
    PhaseChanged(ProtocolPhase),
    /// The connection is gone. Always the last event.
    Disconnected(BackendFailure),
}

/// Delivers backend events to the session that owns the link. Events
/// from a link the session has since replaced are ignored there.
#[derive(Clone)]
pub struct BackendEventSink {
    session: SessionHandle,
    generation: u64,
}

impl BackendEventSink {
    pub fn new(session: SessionHandle, generation: u64) -> Self {
        Self {
            session,
            generation,
        }
    }

    /// Returns false once the session is gone.
    pub fn deliver(&self, event: BackendEvent) -> bool {
        let generation = self.generation;
        self.session
            .dispatch(move |session| session.handle_backend_event(generation, event))
    }
}

/// Extra material for logging in to a backend that verifies accounts.
#[derive(Clone)]
pub struct OnlineLogin {
    pub credentials: Credentials,
    pub provider: Arc<dyn CredentialProvider>,
}

pub struct ConnectRequest {
    pub target: BackendTarget,
    pub events: BackendEventSink,
    pub online: Option<OnlineLogin>,
}

pub type BackendLink = Box<dyn PeerLink<ClientPacket>>;

pub trait BackendConnector: Send + Sync {
    fn connect(&self, request: ConnectRequest) -> BoxFuture<'static, Result<BackendLink, LinkError>>;
}

/// Connects over TCP and runs the Java protocol in a driver task.
pub struct TcpConnector;

impl BackendConnector for TcpConnector {
    fn connect(&self, request: ConnectRequest) -> BoxFuture<'static, Result<BackendLink, LinkError>> {
        Box::pin(async move {
            let ConnectRequest {
                target,
                events,
                online,
            } = request;
            let stream = TcpStream::connect((target.address.as_str(), target.port)).await?;
            stream.set_nodelay(true)?;
            let (link, outbound) = ChannelLink::new(stream.peer_addr().ok());
            tracing::debug!("Connected to backend {}:{}", target.address, target.port);

            let (read_half, write_half) = stream.into_split();
            let driver = Driver {
                codec: VanillaCodec::new(),
                phase: ProtocolPhase::Handshake,
                writer: BufWriter::new(write_half),
                events: events.clone(),
                online,
            };
            tokio::spawn(async move {
                let failure = match driver.run(read_half, &outbound).await {
                    Ok(()) => BackendFailure::Closed,
                    Err(failure) => failure,
                };
                tracing::debug!("Backend connection ended: {failure}");
                outbound.mark_closed();
                events.deliver(BackendEvent::Disconnected(failure));
            });
            Ok(Box::new(link) as BackendLink)
        })
    }
}

/// Hands connections to a backend living in the same process instead
/// of opening a socket.
pub struct RelayConnector {
    acceptor: flume::Sender<RelayConnection>,
}

/// A connection handed to the in-process backend. It reads what the
/// session sends from `packets` and answers through `events`.
pub struct RelayConnection {
    pub target: BackendTarget,
    pub packets: LinkReceiver<ClientPacket>,
    pub events: BackendEventSink,
}

impl RelayConnector {
    pub fn new() -> (Self, flume::Receiver<RelayConnection>) {
        let (acceptor, connections) = flume::unbounded();
        (Self { acceptor }, connections)
    }
}

impl BackendConnector for RelayConnector {
    fn connect(&self, request: ConnectRequest) -> BoxFuture<'static, Result<BackendLink, LinkError>> {
        let (link, packets) = ChannelLink::new(None);
        let sent = self.acceptor.send(RelayConnection {
            target: request.target,
            packets,
            events: request.events,
        });
        Box::pin(async move {
            sent.map_err(|_| LinkError::NoRelay)?;
            Ok(Box::new(link) as BackendLink)
        })
    }
}

const READ_BUFFER_SIZE: usize = 16 * 1024;

struct Driver {
    codec: VanillaCodec,
    /// Phase inbound packets are decoded in.
    phase: ProtocolPhase,
    writer: BufWriter<OwnedWriteHalf>,
    events: BackendEventSink,
    online: Option<OnlineLogin>,
}

impl Driver {
    async fn run(
        mut self,
        mut reader: OwnedReadHalf,
        outbound: &LinkReceiver<ClientPacket>,
    ) -> Result<(), BackendFailure> {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            tokio::select! {
                message = outbound.recv() => match message {
                    Some(LinkMessage::Packet { packet, flush }) => {
                        self.write(&packet).await?;
                        if flush || outbound.is_empty() {
                            self.writer.flush().await.map_err(io_failure)?;
                        }
                    }
                    Some(LinkMessage::Close { .. }) | None => {
                        self.writer.flush().await.ok();
                        self.writer.shutdown().await.ok();
                        return Ok(());
                    }
                },
                read = reader.read(&mut buffer) => {
                    let n = read.map_err(io_failure)?;
                    if n == 0 {
                        return Err(BackendFailure::Protocol("server closed the connection".to_owned()));
                    }
                    self.codec.give_data(&mut buffer[..n]);
                    while let Some(frame) = self.codec.decode_frame().map_err(protocol_failure)? {
                        if !self.handle_frame(&frame).await? {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn write(&mut self, packet: &ClientPacket) -> Result<(), BackendFailure> {
        let bytes = self.codec.encode_packet(packet).map_err(protocol_failure)?;
        self.writer.write_all(&bytes).await.map_err(io_failure)?;
        if let ClientPacket::Handshake(client::handshake::Packet::Handshake(handshake)) = packet {
            if handshake.next_state == client::handshake::NextState::Login {
                self.switch_phase(ProtocolPhase::Login);
            }
        }
        Ok(())
    }

    fn switch_phase(&mut self, phase: ProtocolPhase) -> bool {
        tracing::trace!("Backend phase {} -> {}", self.phase, phase);
        self.phase = phase;
        self.events.deliver(BackendEvent::PhaseChanged(phase))
    }

    /// Returns false once the session stopped listening.
    async fn handle_frame(&mut self, frame: &[u8]) -> Result<bool, BackendFailure> {
        let packet = ServerPacket::decode_in(self.phase, frame).map_err(protocol_failure)?;
        tracing::trace!("Backend packet {}", packet.name());

        let next_phase = match &packet {
            ServerPacket::Login(login::Packet::SetCompression(set_compression)) => {
                self.codec
                    .set_compression(CompressionThreshold::from_announced(set_compression.threshold));
                return Ok(true);
            }
            ServerPacket::Login(login::Packet::EncryptionRequest(request)) => {
                self.answer_encryption(request).await?;
                return Ok(true);
            }
            ServerPacket::Login(login::Packet::Disconnect(disconnect)) => {
                return Err(BackendFailure::Kicked(chat_text(&disconnect.reason)));
            }
            ServerPacket::Configuration(configuration::Packet::Disconnect(disconnect))
            | ServerPacket::Play(play::Packet::Disconnect(disconnect)) => {
                return Err(BackendFailure::Kicked(
                    disconnect.plain_reason().unwrap_or_else(|| "Disconnected".to_owned()),
                ));
            }
            ServerPacket::Login(login::Packet::LoginSuccess(_)) => Some(ProtocolPhase::Configuration),
            ServerPacket::Configuration(configuration::Packet::FinishConfiguration(_)) => {
                Some(ProtocolPhase::Play)
            }
            ServerPacket::Play(play::Packet::StartConfiguration(_)) => {
                Some(ProtocolPhase::Configuration)
            }
            _ => None,
        };

        // The packet is delivered before the phase change so the session
        // answers it in the phase it arrived in.
        if !self.events.deliver(BackendEvent::Packet(packet)) {
            return Ok(false);
        }
        if let Some(phase) = next_phase {
            return Ok(self.switch_phase(phase));
        }
        Ok(true)
    }

    async fn answer_encryption(&mut self, request: &login::EncryptionRequest) -> Result<(), BackendFailure> {
        let Some(online) = &self.online else {
            return Err(BackendFailure::UnexpectedEncryption);
        };
        let answer = online
            .provider
            .answer_encryption(&online.credentials, request)
            .await
            .map_err(|e| BackendFailure::Protocol(e.to_string()))?;
        let response = ClientPacket::Login(client::login::Packet::EncryptionResponse(
            client::login::EncryptionResponse {
                shared_secret: answer.encrypted_shared_secret,
                verify_token: answer.encrypted_verify_token,
            },
        ));
        self.write(&response).await?;
        self.writer.flush().await.map_err(io_failure)?;
        self.codec
            .enable_encryption(EncryptionKey::new(answer.shared_secret))
            .map_err(protocol_failure)?;
        Ok(())
    }
}

fn io_failure(error: std::io::Error) -> BackendFailure {
    BackendFailure::from(LinkError::Io(error))
}

fn protocol_failure(error: impl std::fmt::Display) -> BackendFailure {
    BackendFailure::Protocol(error.to_string())
}

/// Plain text of a JSON chat component: a bare string, or the `text`
/// of an object. Anything else is shown as-is.
pub fn chat_text(json: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::String(text)) => text,
        Ok(serde_json::Value::Object(object)) => match object.get("text") {
            Some(serde_json::Value::String(text)) => text.clone(),
            _ => json.to_owned(),
        },
        _ => json.to_owned(),
    }
}
