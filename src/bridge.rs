//! Process-wide context shared by every session: configuration, the
//! session registry, and the external collaborators.

use crate::{
    auth::{CredentialProvider, MemoryTokenStore, NoCredentialService, PendingAuthentications, RefreshTokenStore},
    backend::{BackendConnector, RelayConnector, TcpConnector},
    config::ProxyConfig,
    events::{NoEvents, SessionEvents},
    identity::PassthroughKey,
    locale::{BuiltinLocalization, Localization},
    position::Vec3,
    registry::SessionRegistry,
    translator::{PacketTranslators, StandardTranslators},
};
use std::sync::Arc;

/// Decides where an idle player really is before a position heartbeat.
pub trait CollisionCheck: Send + Sync {
    /// `None` means the position is not valid right now and nothing
    /// should be sent.
    fn adjust_position(&self, position: Vec3, on_ground: bool) -> Option<Vec3>;
}

/// Accepts every position unchanged.
pub struct NoCollision;

impl CollisionCheck for NoCollision {
    fn adjust_position(&self, position: Vec3, _on_ground: bool) -> Option<Vec3> {
        Some(position)
    }
}

/// Static frontend registries sent to every player on spawn. Produced
/// by the embedding application; empty by default.
#[derive(Debug, Clone, Default)]
pub struct FrontendRegistries {
    pub biome_definitions: Vec<u8>,
    pub entity_identifiers: Vec<u8>,
    pub creative_content: Vec<u8>,
    pub crafting_data: Vec<u8>,
    pub item_components: Vec<u8>,
}

pub struct Bridge {
    config: ProxyConfig,
    sessions: SessionRegistry,
    pending_authentications: PendingAuthentications,
    credentials: Arc<dyn CredentialProvider>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    connector: Arc<dyn BackendConnector>,
    relay: Option<Arc<RelayConnector>>,
    localization: Arc<dyn Localization>,
    translators: Arc<dyn PacketTranslators>,
    collision: Arc<dyn CollisionCheck>,
    events: Arc<dyn SessionEvents>,
    registries: FrontendRegistries,
    passthrough_key: Option<PassthroughKey>,
}

impl Bridge {
    pub fn builder(config: ProxyConfig) -> BridgeBuilder {
        BridgeBuilder {
            bridge: Bridge {
                pending_authentications: PendingAuthentications::new(
                    config.pending_authentication_timeout(),
                ),
                config,
                sessions: SessionRegistry::new(),
                credentials: Arc::new(NoCredentialService),
                refresh_tokens: Arc::new(MemoryTokenStore::default()),
                connector: Arc::new(TcpConnector),
                relay: None,
                localization: Arc::new(BuiltinLocalization::new()),
                translators: Arc::new(StandardTranslators),
                collision: Arc::new(NoCollision),
                events: Arc::new(NoEvents),
                registries: FrontendRegistries::default(),
                passthrough_key: None,
            },
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn pending_authentications(&self) -> &PendingAuthentications {
        &self.pending_authentications
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialProvider> {
        &self.credentials
    }

    pub fn refresh_tokens(&self) -> &dyn RefreshTokenStore {
        &*self.refresh_tokens
    }

    /// The in-process relay when one is registered and enabled, the
    /// socket connector otherwise.
    pub fn connector(&self) -> Arc<dyn BackendConnector> {
        match &self.relay {
            Some(relay) if self.config.use_direct_connection => Arc::clone(relay) as Arc<dyn BackendConnector>,
            _ => Arc::clone(&self.connector),
        }
    }

    pub fn is_relay_connection(&self) -> bool {
        self.relay.is_some() && self.config.use_direct_connection
    }

    /// Resolves a message key in the player's locale.
    pub fn translate(&self, key: &str, locale: &str, args: &[&str]) -> String {
        self.localization.resolve(key, locale, args)
    }

    pub fn translators(&self) -> &Arc<dyn PacketTranslators> {
        &self.translators
    }

    pub fn collision(&self) -> &dyn CollisionCheck {
        &*self.collision
    }

    pub fn events(&self) -> &dyn SessionEvents {
        &*self.events
    }

    pub fn registries(&self) -> &FrontendRegistries {
        &self.registries
    }

    pub fn passthrough_key(&self) -> Option<&PassthroughKey> {
        self.passthrough_key.as_ref()
    }
}

pub struct BridgeBuilder {
    bridge: Bridge,
}

impl BridgeBuilder {
    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.bridge.credentials = credentials;
        self
    }

    pub fn refresh_tokens(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
        self.bridge.refresh_tokens = store;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn BackendConnector>) -> Self {
        self.bridge.connector = connector;
        self
    }

    pub fn relay(mut self, relay: RelayConnector) -> Self {
        self.bridge.relay = Some(Arc::new(relay));
        self
    }

    pub fn localization(mut self, localization: Arc<dyn Localization>) -> Self {
        self.bridge.localization = localization;
        self
    }

    pub fn translators(mut self, translators: Arc<dyn PacketTranslators>) -> Self {
        self.bridge.translators = translators;
        self
    }

    pub fn collision(mut self, collision: Arc<dyn CollisionCheck>) -> Self {
        self.bridge.collision = collision;
        self
    }

    pub fn events(mut self, events: Arc<dyn SessionEvents>) -> Self {
        self.bridge.events = events;
        self
    }

    pub fn registries(mut self, registries: FrontendRegistries) -> Self {
        self.bridge.registries = registries;
        self
    }

    pub fn passthrough_key(mut self, key: PassthroughKey) -> Self {
        self.bridge.passthrough_key = Some(key);
        self
    }

    pub fn build(self) -> Arc<Bridge> {
        Arc::new(self.bridge)
    }
}
