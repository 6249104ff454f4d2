//! The frontend connection: packets exchanged with the Bedrock-side
//! client and the framing used to carry them.
//!
//! The Bedrock wire protocol itself lives outside this crate. Frontend
//! packets are modelled as plain Rust enums and framed with `bincode`
//! over a length-delimited codec, so that any transport speaking the
//! real protocol can sit in front of the listener and translate.

use crate::{
    entity_id::RuntimeId,
    identity::ClientIdentity,
    link::{LinkMessage, LinkReceiver},
    player::GameMode,
    position::{BlockPosition, ChunkPosition, Rotation, Vec3},
    session::SessionHandle,
};
use anyhow::Context;
use bincode::Options;
use bitflags::bitflags;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// A packet sent by the frontend client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::AsRefStr)]
pub enum ClientPacket {
    /// First packet on every connection.
    Login(ClientIdentity),
    /// The client finished loading the world.
    SetLocalPlayerAsInitialized,
    RequestChunkRadius {
        radius: i32,
    },
    MovePlayer {
        position: Vec3,
        rotation: Rotation,
        on_ground: bool,
    },
    Text {
        message: String,
    },
    /// A slash command, without the leading slash.
    CommandRequest {
        command: String,
    },
    /// Arm swing animation.
    Animate,
    PlayerAction(PlayerAction),
    ModalFormResponse {
        form_id: u32,
        /// Index of the pressed button, `None` if the form was closed.
        response: Option<usize>,
    },
    BookEdit {
        slot: i32,
        pages: Vec<String>,
        title: Option<String>,
    },
    /// The player picked an emote piece to show to others.
    Emote {
        piece: String,
    },
    /// The client opened or closed the advancements screen.
    AdvancementTab {
        tab: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlayerAction {
    StartSneak,
    StopSneak,
    StartSprint,
    StopSprint,
    StartSwimming,
    StopSwimming,
    StartFlying,
    StopFlying,
    Respawn,
    StartBreak(BlockPosition),
    AbortBreak(BlockPosition),
    StopBreak(BlockPosition),
    SwapOffhand,
}

/// A packet sent to the frontend client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::AsRefStr)]
pub enum ServerPacket {
    StartGame(StartGame),
    PlayStatus(PlayStatus),
    ItemComponents(Vec<u8>),
    BiomeDefinitions(Vec<u8>),
    AvailableEntityIdentifiers(Vec<u8>),
    CreativeContent(Vec<u8>),
    CraftingData(Vec<u8>),
    LevelChunk {
        position: ChunkPosition,
        /// Chunk sections, empty for a placeholder chunk.
        data: Vec<u8>,
    },
    ChunkRadiusUpdated {
        radius: i32,
    },
    UpdateAttributes {
        runtime_id: RuntimeId,
        attributes: Vec<Attribute>,
    },
    GameRulesChanged(Vec<GameRule>),
    SetTime {
        time: i32,
    },
    Text {
        kind: TextKind,
        message: String,
    },
    MovePlayer {
        runtime_id: RuntimeId,
        position: Vec3,
        rotation: Rotation,
        mode: MoveMode,
        on_ground: bool,
    },
    PlayerFog(Vec<String>),
    ModalForm {
        form_id: u32,
        form: Form,
    },
    SetEntityFlags {
        runtime_id: RuntimeId,
        flags: EntityFlags,
    },
    UpdateAbilities {
        runtime_id: RuntimeId,
        command_permission: u8,
        abilities: Abilities,
        fly_speed: f32,
        walk_speed: f32,
    },
    SetPlayerGameType(GameMode),
    EmoteList {
        runtime_id: RuntimeId,
        pieces: Vec<String>,
    },
    Emote {
        runtime_id: RuntimeId,
        piece: String,
    },
    SpawnParticle {
        identifier: String,
        position: Vec3,
    },
    LevelEvent {
        event: LevelEvent,
        position: Vec3,
        data: i32,
    },
    AddEntity {
        runtime_id: RuntimeId,
        kind: i32,
        position: Vec3,
        velocity: Vec3,
    },
    RemoveEntity {
        runtime_id: RuntimeId,
    },
    MoveEntity {
        runtime_id: RuntimeId,
        position: Vec3,
        rotation: Rotation,
    },
    SetHealth {
        health: f32,
    },
    BlockUpdate {
        position: BlockPosition,
        block_state: i32,
    },
    Transfer {
        address: String,
        port: u16,
    },
    CameraShake {
        intensity: f32,
        duration: f32,
        kind: CameraShakeKind,
        stop: bool,
    },
    /// Adds or removes values of a command argument enum.
    UpdateSoftEnum {
        name: String,
        action: SoftEnumAction,
        values: Vec<String>,
    },
    Disconnect {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartGame {
    pub runtime_id: RuntimeId,
    pub game_mode: GameMode,
    pub position: Vec3,
    pub rotation: Rotation,
    pub dimension: i32,
    pub world_name: String,
    pub server_authoritative_movement: bool,
    pub custom_items: bool,
    pub achievements_disabled: bool,
    pub command_suggestions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayStatus {
    LoginSuccess,
    FailedClient,
    FailedServer,
    PlayerSpawn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRule {
    pub name: String,
    pub value: GameRuleValue,
}

impl GameRule {
    pub fn bool(name: &str, value: bool) -> Self {
        Self {
            name: name.to_owned(),
            value: GameRuleValue::Bool(value),
        }
    }

    pub fn int(name: &str, value: i32) -> Self {
        Self {
            name: name.to_owned(),
            value: GameRuleValue::Int(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameRuleValue {
    Bool(bool),
    Int(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextKind {
    Raw,
    Chat,
    System,
    Tip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveMode {
    Normal,
    Reset,
    Teleport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelEvent {
    StartRaining,
    StopRaining,
    StartThunderstorm,
    StopThunderstorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraShakeKind {
    Positional,
    Rotational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoftEnumAction {
    Add,
    Remove,
}

/// A simple form: some text and a list of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub title: String,
    pub content: String,
    pub buttons: Vec<String>,
}

bitflags! {
    /// Entity metadata flags the session drives directly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EntityFlags: u64 {
        const ON_FIRE = 1 << 0;
        const SNEAKING = 1 << 1;
        const SPRINTING = 1 << 3;
        const GLIDING = 1 << 32;
        const SWIMMING = 1 << 38;
        const BLOCKING = 1 << 49;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Abilities: u32 {
        const BUILD = 1 << 0;
        const MINE = 1 << 1;
        const ATTACK_PLAYERS = 1 << 5;
        const INSTABUILD = 1 << 8;
        const FLYING = 1 << 9;
        const MAY_FLY = 1 << 10;
        const INVULNERABLE = 1 << 11;
        const NO_CLIP = 1 << 13;
    }
}

/// Writes queued packets to the client until the link is closed.
///
/// Unflushed packets are fed into the sink and only flushed once the
/// queue runs dry or a packet asks for it, so bursts go out together.
pub async fn write_loop(
    write_half: OwnedWriteHalf,
    outbound: LinkReceiver<ServerPacket>,
) -> anyhow::Result<()> {
    let mut framed = FramedWrite::new(write_half, LengthDelimitedCodec::new());
    while let Some(message) = outbound.recv().await {
        match message {
            LinkMessage::Packet { packet, flush } => {
                framed.feed(Bytes::from(encode(&packet)?)).await?;
                if flush || outbound.is_empty() {
                    SinkExt::<Bytes>::flush(&mut framed).await?;
                }
            }
            LinkMessage::Close { reason } => {
                let goodbye = encode(&ServerPacket::Disconnect { message: reason })?;
                framed.send(Bytes::from(goodbye)).await?;
                break;
            }
        }
    }
    outbound.mark_closed();
    SinkExt::<Bytes>::close(&mut framed).await.ok();
    Ok(())
}

/// Reads packets from the client and hands them to the session.
/// Returns when the client goes away.
pub async fn read_loop(read_half: OwnedReadHalf, session: SessionHandle) -> anyhow::Result<()> {
    let mut framed = FramedRead::new(read_half, LengthDelimitedCodec::new());
    while let Some(frame) = framed.next().await {
        let frame = frame.context("frontend read failed")?;
        let packet: ClientPacket = decode(&frame)?;
        tracing::trace!("Frontend packet {}", packet.as_ref());
        if !session.dispatch(move |session| session.handle_frontend_packet(packet)) {
            break;
        }
    }
    Ok(())
}

pub fn encode<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    bincode::options()
        .serialize(value)
        .map_err(anyhow::Error::from)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    bincode::options()
        .deserialize(bytes)
        .map_err(anyhow::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ChannelLink, PeerLink};

    #[test]
    fn packets_survive_bincode() {
        let packet = ServerPacket::SetEntityFlags {
            runtime_id: RuntimeId::LOCAL_PLAYER,
            flags: EntityFlags::SNEAKING | EntityFlags::BLOCKING,
        };
        let bytes = encode(&packet).unwrap();
        assert_eq!(decode::<ServerPacket>(&bytes).unwrap(), packet);
    }

    #[tokio::test]
    async fn writer_frames_packets_then_the_disconnect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = tokio::net::TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let (_, write_half) = server.into_split();

        let (link, outbound) = ChannelLink::new(None);
        link.send(ServerPacket::ChunkRadiusUpdated { radius: 8 });
        link.send_immediate(ServerPacket::ChunkRadiusUpdated { radius: 4 });
        link.close("Server closed");
        write_loop(write_half, outbound).await.unwrap();

        let frames: Vec<ServerPacket> = FramedRead::new(client, LengthDelimitedCodec::new())
            .map(|frame| decode(&frame.unwrap()).unwrap())
            .collect()
            .await;
        assert_eq!(
            frames,
            [
                ServerPacket::ChunkRadiusUpdated { radius: 8 },
                ServerPacket::ChunkRadiusUpdated { radius: 4 },
                ServerPacket::Disconnect {
                    message: "Server closed".to_owned()
                },
            ]
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode::<ClientPacket>(&[0xff, 0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
