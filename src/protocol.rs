//! Java Edition wire protocol spoken on the backend side of the bridge.

pub const PROTOCOL_VERSION: u32 = 765; // 1.20.4

mod decoder;
mod encoder;
pub mod packet;
pub mod vanilla_codec;

pub use decoder::{Decode, DecodeError, Decoder};
pub use encoder::{Encode, Encoder};

/// Limit to avoid out-of-memory DOS.
const BUFFER_LIMIT: usize = 1024 * 1024 * 8; // 8 MiB, chunk packets can be large

/// Sub-protocol a backend connection is currently speaking.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
pub enum ProtocolPhase {
    Handshake,
    Login,
    Configuration,
    Play,
}

/// A packet whose body is not decoded, kept so it can be inspected
/// or re-encoded without loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: i32,
    pub data: Vec<u8>,
}

impl RawPacket {
    /// Takes the remainder of `decoder` as the body of packet `id`.
    pub fn read_body(id: i32, decoder: &mut Decoder) -> Self {
        Self {
            id,
            data: decoder.consume_remaining().to_vec(),
        }
    }
}

impl Encode for RawPacket {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_int(self.id);
        encoder.write_slice(&self.data);
    }
}
