use minecraft_bridge_macros::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    Handshake(Handshake),
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Handshake {
    #[encoding(varint)]
    pub protocol_version: u32,
    /// Hostname the client claims to have connected to. Proxies in
    /// passthrough mode append a NUL-separated identity payload here.
    pub server_address: String,
    pub server_port: u16,
    pub next_state: NextState,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Encode, Decode)]
#[encoding(discriminant = "varint")]
pub enum NextState {
    #[encoding(id = 1)]
    Status,
    #[encoding(id = 2)]
    Login,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Decode, Decoder, Encode, Encoder};

    #[test]
    fn handshake_layout() {
        let handshake = Packet::Handshake(Handshake {
            protocol_version: 765,
            server_address: "mc".to_owned(),
            server_port: 25565,
            next_state: NextState::Login,
        });
        let mut buf = Vec::new();
        handshake.encode(&mut Encoder::new(&mut buf));
        assert_eq!(buf, [0x00, 0xfd, 0x05, 2, b'm', b'c', 0x63, 0xdd, 2]);

        let Packet::Handshake(decoded) = Packet::decode(&mut Decoder::new(&buf)).unwrap();
        assert_eq!(decoded.server_address, "mc");
        assert_eq!(decoded.next_state, NextState::Login);
    }
}
