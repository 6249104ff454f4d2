use minecraft_bridge_macros::{Decode, Encode};
use uuid::Uuid;

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    LoginStart(LoginStart),
    #[encoding(id = 0x01)]
    EncryptionResponse(EncryptionResponse),
    #[encoding(id = 0x02)]
    LoginPluginResponse(LoginPluginResponse),
    #[encoding(id = 0x03)]
    LoginAcknowledged(LoginAcknowledged),
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct LoginStart {
    pub name: String,
    pub uuid: Uuid,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EncryptionResponse {
    #[encoding(length_prefix = "varint")]
    pub shared_secret: Vec<u8>,
    #[encoding(length_prefix = "varint")]
    pub verify_token: Vec<u8>,
}

/// Reply to a login plugin request. We understand no login
/// plugin channels, so `successful` is always false in practice.
#[derive(Debug, Clone, Encode, Decode)]
pub struct LoginPluginResponse {
    #[encoding(varint)]
    pub message_id: i32,
    pub successful: bool,
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct LoginAcknowledged;
