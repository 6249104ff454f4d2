use crate::{
    position::BlockPosition,
    protocol::{decoder, packet::client::configuration::ClientInformation, Decode, Decoder, Encode, Encoder},
};
use minecraft_bridge_macros::{Decode, Encode};

/// Serverbound play packets the bridge originates.
#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    ConfirmTeleportation(ConfirmTeleportation),
    #[encoding(id = 0x04)]
    ChatCommand(ChatCommand),
    #[encoding(id = 0x05)]
    ChatMessage(ChatMessage),
    #[encoding(id = 0x08)]
    ClientStatus(ClientStatus),
    #[encoding(id = 0x09)]
    ClientInformation(ClientInformation),
    #[encoding(id = 0x0b)]
    AcknowledgeConfiguration(AcknowledgeConfiguration),
    #[encoding(id = 0x11)]
    EditBook(EditBook),
    #[encoding(id = 0x15)]
    KeepAlive(KeepAlive),
    #[encoding(id = 0x17)]
    SetPlayerPosition(SetPlayerPosition),
    #[encoding(id = 0x18)]
    SetPlayerPositionAndRotation(SetPlayerPositionAndRotation),
    #[encoding(id = 0x20)]
    PlayerAbilities(PlayerAbilities),
    #[encoding(id = 0x21)]
    PlayerAction(PlayerAction),
    #[encoding(id = 0x22)]
    PlayerCommand(PlayerCommand),
    #[encoding(id = 0x24)]
    Pong(Pong),
    #[encoding(id = 0x29)]
    SeenAdvancements(SeenAdvancements),
    #[encoding(id = 0x33)]
    SwingArm(SwingArm),
    #[encoding(id = 0x36)]
    UseItem(UseItem),
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ConfirmTeleportation {
    #[encoding(varint)]
    pub teleport_id: i32,
}

/// Unsigned chat trailer: no signature(s), no acknowledged messages,
/// and an empty 20-bit acknowledgement set.
const UNSIGNED_CHAT_TRAILER: [u8; 5] = [0; 5];

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChatCommand {
    pub command: String,
    pub timestamp: i64,
    pub salt: i64,
    #[encoding(length_prefix = "inferred")]
    pub signature_data: Vec<u8>,
}

impl ChatCommand {
    pub fn unsigned(command: impl Into<String>, timestamp: i64) -> Self {
        Self {
            command: command.into(),
            timestamp,
            salt: 0,
            signature_data: UNSIGNED_CHAT_TRAILER.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChatMessage {
    pub message: String,
    pub timestamp: i64,
    pub salt: i64,
    #[encoding(length_prefix = "inferred")]
    pub signature_data: Vec<u8>,
}

impl ChatMessage {
    pub fn unsigned(message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            message: message.into(),
            timestamp,
            salt: 0,
            signature_data: UNSIGNED_CHAT_TRAILER.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ClientStatus {
    #[encoding(varint)]
    pub action: i32,
}

impl ClientStatus {
    pub const PERFORM_RESPAWN: i32 = 0;
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct AcknowledgeConfiguration;

#[derive(Debug, Clone, Encode, Decode)]
pub struct EditBook {
    #[encoding(varint)]
    pub slot: i32,
    #[encoding(length_prefix = "varint")]
    pub pages: Vec<String>,
    #[encoding(bool_prefixed)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct KeepAlive {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct SetPlayerPosition {
    pub x: f64,
    pub feet_y: f64,
    pub z: f64,
    pub on_ground: bool,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct SetPlayerPositionAndRotation {
    pub x: f64,
    pub feet_y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerAbilities {
    pub flags: i8,
}

impl PlayerAbilities {
    pub const FLYING: i8 = 0x02;
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PlayerAction {
    #[encoding(varint)]
    pub status: i32,
    pub location: BlockPosition,
    pub face: i8,
    #[encoding(varint)]
    pub sequence: i32,
}

impl PlayerAction {
    pub const START_DIGGING: i32 = 0;
    pub const CANCELLED_DIGGING: i32 = 1;
    pub const FINISHED_DIGGING: i32 = 2;
    pub const RELEASE_USE_ITEM: i32 = 5;
    pub const SWAP_ITEM_IN_HAND: i32 = 6;
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PlayerCommand {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(varint)]
    pub action: i32,
    #[encoding(varint)]
    pub jump_boost: i32,
}

impl PlayerCommand {
    pub const START_SNEAKING: i32 = 0;
    pub const STOP_SNEAKING: i32 = 1;
    pub const START_SPRINTING: i32 = 3;
    pub const STOP_SPRINTING: i32 = 4;
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Pong {
    pub id: i32,
}

/// Advancement tab interaction. The tab id is only present when
/// a tab was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeenAdvancements {
    OpenedTab(String),
    ClosedScreen,
}

impl Encode for SeenAdvancements {
    fn encode(&self, encoder: &mut Encoder) {
        match self {
            Self::OpenedTab(tab) => {
                encoder.write_var_int(0);
                encoder.write_string(tab);
            }
            Self::ClosedScreen => {
                encoder.write_var_int(1);
            }
        }
    }
}

impl Decode for SeenAdvancements {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        match decoder.read_var_int()? {
            0 => Ok(Self::OpenedTab(String::decode(decoder)?)),
            _ => Ok(Self::ClosedScreen),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct SwingArm {
    #[encoding(varint)]
    pub hand: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct UseItem {
    #[encoding(varint)]
    pub hand: i32,
    #[encoding(varint)]
    pub sequence: i32,
}

pub const MAIN_HAND: i32 = 0;
pub const OFF_HAND: i32 = 1;
