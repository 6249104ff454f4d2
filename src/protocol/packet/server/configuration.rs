use crate::protocol::RawPacket;
use minecraft_bridge_macros::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    PluginMessage(PluginMessage),
    #[encoding(id = 0x01)]
    Disconnect(super::play::Disconnect),
    #[encoding(id = 0x02)]
    FinishConfiguration(FinishConfiguration),
    #[encoding(id = 0x03)]
    KeepAlive(KeepAlive),
    #[encoding(id = 0x04)]
    Ping(Ping),
    #[encoding(id = 0x05)]
    RegistryData(RegistryData),
    #[encoding(id = 0x08)]
    FeatureFlags(FeatureFlags),
    #[encoding(id = 0x09)]
    UpdateTags(super::play::UpdateTags),
    #[encoding(fallback)]
    Other(RawPacket),
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
pub struct Ping {
    pub id: i32,
}

/// Registry codec as network NBT. Handed opaque to the translators.
#[derive(Debug, Clone, Encode, Decode)]
pub struct RegistryData {
    #[encoding(length_prefix = "inferred")]
    pub nbt: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct FeatureFlags {
    #[encoding(length_prefix = "varint")]
    pub flags: Vec<String>,
}
