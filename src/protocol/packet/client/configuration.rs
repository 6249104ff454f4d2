use minecraft_bridge_macros::{Decode, Encode};
use uuid::Uuid;

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    ClientInformation(ClientInformation),
    #[encoding(id = 0x01)]
    PluginMessage(PluginMessage),
    #[encoding(id = 0x02)]
    FinishConfiguration(FinishConfiguration),
    #[encoding(id = 0x03)]
    KeepAlive(KeepAlive),
    #[encoding(id = 0x04)]
    Pong(Pong),
    #[encoding(id = 0x05)]
    ResourcePackResponse(ResourcePackResponse),
}

/// Client settings. Shared with the play-phase packet of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ClientInformation {
    pub locale: String,
    pub view_distance: i8,
    #[encoding(varint)]
    pub chat_mode: i32,
    pub chat_colors: bool,
    pub displayed_skin_parts: u8,
    #[encoding(varint)]
    pub main_hand: i32,
    pub text_filtering: bool,
    pub allow_server_listings: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PluginMessage {
    pub channel: String,
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct FinishConfiguration;

#[derive(Debug, Clone, Encode, Decode)]
pub struct KeepAlive {
    pub id: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Pong {
    pub id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ResourcePackResponse {
    pub uuid: Uuid,
    #[encoding(varint)]
    pub result: i32,
}
