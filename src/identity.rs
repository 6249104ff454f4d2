//! Who a frontend client claims to be, and how that identity is carried
//! to the backend.

use crate::error::PassthroughError;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::{fmt::Write, path::Path};
use uuid::Uuid;

/// Platform the frontend client runs on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display)]
pub enum DeviceOs {
    #[default]
    Unknown,
    Android,
    Ios,
    MacOs,
    Windows,
    Xbox,
    Switch,
    PlayStation,
}

/// Identity data presented by the frontend client at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub name: String,
    /// Xbox user id, decimal.
    pub xuid: String,
    pub locale: String,
    pub device_os: DeviceOs,
    pub game_version: String,
    /// `host:port` the client typed in to reach us.
    pub server_address: String,
    pub ui_profile: u8,
    pub input_mode: u8,
}

impl ClientIdentity {
    /// Builds an identity with placeholder device data.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            xuid: "0".to_owned(),
            locale: "en_us".to_owned(),
            device_os: DeviceOs::Unknown,
            game_version: String::new(),
            server_address: String::new(),
            ui_profile: 0,
            input_mode: 0,
        }
    }

    /// Hostname part of the address the client connected with.
    pub fn requested_host(&self) -> &str {
        self.server_address
            .split(':')
            .next()
            .unwrap_or(&self.server_address)
    }
}

/// UUID the backend assigns to unauthenticated players:
/// an MD5 name-based UUID of `"OfflinePlayer:" + name`.
pub fn offline_uuid(name: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{name}").as_bytes());
    uuid::Builder::from_md5_bytes(digest.into()).into_uuid()
}

/// UUID derived from an Xbox user id, used for passthrough players.
pub fn xuid_uuid(xuid: &str) -> Uuid {
    let xuid: u64 = xuid.parse().unwrap_or(0);
    Uuid::from_u64_pair(0, xuid)
}

/// Everything the backend needs to recognise a passthrough player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassthroughPayload {
    pub game_version: String,
    pub name: String,
    pub xuid: String,
    pub device_os: DeviceOs,
    pub language: String,
    pub ui_profile: u8,
    pub input_mode: u8,
    /// Client IP, without any IPv6 scope suffix.
    pub ip: String,
}

impl PassthroughPayload {
    pub fn new(identity: &ClientIdentity, ip: &str) -> Self {
        let ip = ip.split('%').next().unwrap_or(ip).to_owned();
        Self {
            game_version: identity.game_version.clone(),
            name: identity.name.clone(),
            xuid: identity.xuid.clone(),
            device_os: identity.device_os,
            language: identity.locale.clone(),
            ui_profile: identity.ui_profile,
            input_mode: identity.input_mode,
            ip,
        }
    }
}

const NONCE_SIZE: usize = 12;

/// Pre-shared key between the bridge and the backend for sealing
/// passthrough payloads with ChaCha20-Poly1305.
#[derive(Clone)]
pub struct PassthroughKey {
    cipher: ChaCha20Poly1305,
}

impl PassthroughKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PassthroughError> {
        if bytes.len() != 32 {
            return Err(PassthroughError::InvalidKeySize(bytes.len()));
        }
        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(bytes)),
        })
    }

    pub fn load(path: &Path) -> Result<Self, PassthroughError> {
        Self::from_bytes(&fs_err::read(path)?)
    }

    /// Serializes and seals `payload`, returning hex of nonce || ciphertext || tag.
    pub fn seal(&self, payload: &PassthroughPayload) -> Result<String, PassthroughError> {
        let plaintext = bincode::serialize(payload).map_err(|_| PassthroughError::Seal)?;
        let nonce_bytes: [u8; NONCE_SIZE] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|_| PassthroughError::Seal)?;

        let mut sealed = String::with_capacity((NONCE_SIZE + ciphertext.len()) * 2);
        for byte in nonce_bytes.iter().chain(&ciphertext) {
            let _ = write!(sealed, "{byte:02x}");
        }
        Ok(sealed)
    }

    /// Reverses [`seal`](Self::seal).
    pub fn open(&self, sealed: &str) -> Result<PassthroughPayload, PassthroughError> {
        if sealed.len() % 2 != 0 || sealed.len() < NONCE_SIZE * 2 {
            return Err(PassthroughError::Malformed);
        }
        let bytes = (0..sealed.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(sealed.get(i..i + 2)?, 16).ok())
            .collect::<Option<Vec<u8>>>()
            .ok_or(PassthroughError::Malformed)?;
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| PassthroughError::Open)?;
        bincode::deserialize(&plaintext).map_err(|_| PassthroughError::Malformed)
    }
}

impl std::fmt::Debug for PassthroughKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PassthroughKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_uuid_matches_backend() {
        // Value the Java server computes for "Steve".
        assert_eq!(
            offline_uuid("Steve").to_string(),
            "5627dd98-e6be-3c21-b8a8-e92344183641"
        );
        assert_eq!(offline_uuid("Steve").get_version_num(), 3);
    }

    #[test]
    fn xuid_fills_low_bits() {
        let uuid = xuid_uuid("2535405290583316");
        assert_eq!(uuid.as_u64_pair(), (0, 2535405290583316));
        assert_eq!(xuid_uuid("not a number"), Uuid::nil());
    }

    #[test]
    fn requested_host_strips_port() {
        let mut identity = ClientIdentity::named("Alex");
        identity.server_address = "play.example.net:19132".to_owned();
        assert_eq!(identity.requested_host(), "play.example.net");
    }

    #[test]
    fn sealed_payload_opens_with_same_key_only() {
        let key = PassthroughKey::from_bytes(&[3; 32]).unwrap();
        let other = PassthroughKey::from_bytes(&[4; 32]).unwrap();
        let payload = PassthroughPayload::new(&ClientIdentity::named("Alex"), "fe80::1%eth0");
        assert_eq!(payload.ip, "fe80::1");

        let sealed = key.seal(&payload).unwrap();
        assert!(!sealed.contains('\0'));
        assert_eq!(key.open(&sealed).unwrap(), payload);
        assert!(matches!(other.open(&sealed), Err(PassthroughError::Open)));
        assert!(matches!(key.open("zz"), Err(PassthroughError::Malformed)));
    }

    #[test]
    fn rejects_short_key() {
        assert!(matches!(
            PassthroughKey::from_bytes(&[0; 16]),
            Err(PassthroughError::InvalidKeySize(16))
        ));
    }
}
