//! Packets sent by the backend server.

pub mod configuration;
pub mod login;
pub mod play;
