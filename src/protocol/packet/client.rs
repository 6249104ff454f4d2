//! Packets sent by the client, which the bridge is towards the backend.

pub mod configuration;
pub mod handshake;
pub mod login;
pub mod play;
