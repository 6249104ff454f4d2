//! Per-connection session engine for a proxy that lets Bedrock Edition
//! clients play on Java Edition servers.
//!
//! Each accepted frontend connection gets a [`session::Session`]. The
//! session owns two peer links: the _frontend_ link to the Bedrock
//! client and the _backend_ link to the Java server. It walks the
//! connection through its lifecycle:
//! `Idle → Authenticating → ConnectingDownstream → Spawned`, and from
//! any of these to `Disconnecting → Closed`.
//!
//! # Threading
//! Every session runs on its own thread with a tokio `LocalSet`.
//! Everything that touches session state runs on that loop: packets
//! from either link, login continuations and the 50 ms game tick. Other
//! tasks reach a session through its [`session::SessionHandle`], which
//! queues a closure onto the loop. This gives each session a single
//! logical owner without any locks around its state.
//!
//! # Logging in
//! The backend credentials are obtained in one of three ways, chosen by
//! [`config::AuthType`]: the frontend name for offline servers, a sealed
//! identity payload forwarded in the handshake for passthrough servers,
//! or a Java account for online servers. Online logins reuse a stored
//! refresh token when there is one and fall back to a device-code flow
//! shown to the player in a form. A device-code login survives the
//! player reconnecting: the pending task is shared through the bridge
//! and only expires after a timeout.
//!
//! # Translation
//! Packet translation between the two protocols is pluggable through
//! [`translator::PacketTranslators`]. The session engine guarantees
//! that translated packets only reach the backend once the player has
//! spawned, and only in the protocol phase the backend connection is in.

pub mod auth;
pub mod backend;
pub mod bridge;
pub mod cache;
pub mod command;
pub mod config;
pub mod connection;
pub mod entity_id;
pub mod error;
pub mod events;
pub mod frontend;
pub mod identity;
pub mod link;
pub mod listener;
pub mod locale;
pub mod player;
pub mod position;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod tick;
pub mod translator;
