//! Packet types for each protocol phase.
//!
//! Full parsing of packets is _not_ implemented. Only the fields the
//! session keeps state for are decoded; the rest of a packet is kept as
//! trailing bytes so it can be re-encoded without loss.

use crate::protocol::{Decode, DecodeError, Decoder, Encode, Encoder, ProtocolPhase};
use minecraft_bridge_macros::FromVariants;

pub mod client;
pub mod server;

/// A packet the bridge sends to the backend, tagged with the phase
/// it belongs to.
#[derive(Debug, Clone, FromVariants)]
pub enum ClientPacket {
    Handshake(client::handshake::Packet),
    Login(client::login::Packet),
    Configuration(client::configuration::Packet),
    Play(client::play::Packet),
}

impl ClientPacket {
    pub fn phase(&self) -> ProtocolPhase {
        match self {
            ClientPacket::Handshake(_) => ProtocolPhase::Handshake,
            ClientPacket::Login(_) => ProtocolPhase::Login,
            ClientPacket::Configuration(_) => ProtocolPhase::Configuration,
            ClientPacket::Play(_) => ProtocolPhase::Play,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ClientPacket::Handshake(p) => p.as_ref(),
            ClientPacket::Login(p) => p.as_ref(),
            ClientPacket::Configuration(p) => p.as_ref(),
            ClientPacket::Play(p) => p.as_ref(),
        }
    }
}

impl Encode for ClientPacket {
    fn encode(&self, encoder: &mut Encoder) {
        match self {
            ClientPacket::Handshake(p) => p.encode(encoder),
            ClientPacket::Login(p) => p.encode(encoder),
            ClientPacket::Configuration(p) => p.encode(encoder),
            ClientPacket::Play(p) => p.encode(encoder),
        }
    }
}

/// A packet received from the backend, tagged with the phase it
/// was decoded in.
#[derive(Debug, Clone, FromVariants)]
pub enum ServerPacket {
    Login(server::login::Packet),
    Configuration(server::configuration::Packet),
    Play(server::play::Packet),
}

impl ServerPacket {
    /// Decodes a packet body received while the connection is in `phase`.
    pub fn decode_in(phase: ProtocolPhase, bytes: &[u8]) -> Result<Self, DecodeError> {
        let decoder = &mut Decoder::new(bytes);
        Ok(match phase {
            ProtocolPhase::Handshake => {
                return Err(DecodeError::Other(anyhow::anyhow!(
                    "server sent a packet during handshake"
                )))
            }
            ProtocolPhase::Login => ServerPacket::Login(Decode::decode(decoder)?),
            ProtocolPhase::Configuration => ServerPacket::Configuration(Decode::decode(decoder)?),
            ProtocolPhase::Play => ServerPacket::Play(Decode::decode(decoder)?),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            ServerPacket::Login(p) => p.as_ref(),
            ServerPacket::Configuration(p) => p.as_ref(),
            ServerPacket::Play(p) => p.as_ref(),
        }
    }
}
