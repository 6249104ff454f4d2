//! Bridge configuration, loaded from a JSON file.
//!
//! Every field has a default, so `{}` is a valid config.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address the frontend listener binds to.
    pub bind_address: SocketAddr,
    pub remote: RemoteConfig,
    /// How long an interactive login may stay unresolved.
    pub pending_authentication_timeout_secs: u64,
    pub debug_mode: bool,
    pub log_player_ip_addresses: bool,
    /// Shown as the world name on spawn.
    pub server_name: String,
    /// 32-byte key used to seal passthrough identity payloads.
    pub passthrough_key_file: PathBuf,
    pub command_suggestions: bool,
    pub add_non_native_items: bool,
    pub xbox_achievements_enabled: bool,
    /// Connect through an in-process relay when one is registered
    /// instead of opening a TCP socket.
    pub use_direct_connection: bool,
    pub default_locale: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 19132)),
            remote: RemoteConfig::default(),
            pending_authentication_timeout_secs: 120,
            debug_mode: false,
            log_player_ip_addresses: true,
            server_name: "Minecraft Bridge".to_owned(),
            passthrough_key_file: PathBuf::from("passthrough.key"),
            command_suggestions: true,
            add_non_native_items: true,
            xbox_achievements_enabled: false,
            use_direct_connection: true,
            default_locale: "en_us".to_owned(),
        }
    }
}

impl ProxyConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs_err::read_to_string(path)?;
        serde_json::from_str(&text).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn pending_authentication_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_authentication_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub address: String,
    pub port: u16,
    pub auth_type: AuthType,
    /// Forward the hostname the client connected with instead of `address`.
    pub forward_host: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_owned(),
            port: 25565,
            auth_type: AuthType::Online,
            forward_host: false,
        }
    }
}

/// How players are authenticated towards the backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuthType {
    /// Backend does not verify accounts; the frontend name is used as-is.
    Offline,
    /// Each player signs in with their own Java account.
    Online,
    /// Identity is vouched for by a sealed payload in the handshake.
    #[serde(alias = "floodgate")]
    Passthrough,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config: ProxyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProxyConfig::default());
        assert_eq!(config.pending_authentication_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn partial_remote_section() {
        let config: ProxyConfig = serde_json::from_str(
            r#"{ "remote": { "auth_type": "floodgate", "port": 25577 }, "debug_mode": true }"#,
        )
        .unwrap();
        assert_eq!(config.remote.auth_type, AuthType::Passthrough);
        assert_eq!(config.remote.port, 25577);
        assert_eq!(config.remote.address, "127.0.0.1");
        assert!(config.debug_mode);
    }
}
