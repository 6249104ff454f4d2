//! The per-connection session: the aggregate that owns both peer links,
//! the caches and the player state, and the loop all of it runs on.
//!
//! Everything that touches session state runs on the session loop.
//! Other tasks reach it through [`SessionHandle::dispatch`], which
//! queues a closure that the loop runs between ticks.

mod auth;
mod downstream;

pub use auth::ResumeEvent;

use crate::{
    backend::{BackendLink, BackendTarget},
    bridge::Bridge,
    cache::{world_border::WALL_PARTICLE, world_border::WARNING_FOG, SessionCaches},
    connection::{ConnectionManager, ConnectionPhase},
    events::DisconnectEvent,
    frontend::{
        self, Attribute, CameraShakeKind, Form, GameRule, GameRuleValue, MoveMode, PlayStatus,
        SoftEnumAction, StartGame, TextKind,
    },
    identity::ClientIdentity,
    link::PeerLink,
    player::{Hand, PlayerState, ARM_SWING_INACTIVE, ARM_SWING_PENDING},
    position::{BlockPosition, ChunkPosition},
    protocol::{
        packet::{client::play, ClientPacket},
        ProtocolPhase,
    },
    registry::SessionId,
    tick::{self, TickEffect, TickScheduler},
};
use once_cell::sync::OnceCell;
use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;

/// A unit of work queued onto a session loop.
pub type Work = Box<dyn FnOnce(&mut Session) + Send>;

/// The queue a session loop drains. Created before the session so
/// that it can be handed to the session at construction.
pub struct ExecutionContext {
    sender: flume::Sender<Work>,
    receiver: flume::Receiver<Work>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared {
    id: SessionId,
    name: OnceCell<String>,
    /// Set last during teardown. Readable from any thread.
    closed: AtomicBool,
    work: flume::Sender<Work>,
}

/// Cheap, cloneable reference to a session, usable from any thread.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Player name, once the client has logged in.
    pub fn name(&self) -> Option<&str> {
        self.shared.name.get().map(String::as_str)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Queues `work` onto the session loop. Returns false, dropping the
    /// work, if the session is already closed.
    pub fn dispatch(&self, work: impl FnOnce(&mut Session) + Send + 'static) -> bool {
        if self.is_closed() {
            tracing::trace!("Dropping work for closed session {}", self.id().as_u64());
            return false;
        }
        self.shared.work.send(Box::new(work)).is_ok()
    }

    pub fn disconnect(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.dispatch(move |session| session.disconnect(&reason))
    }
}

pub struct Session {
    bridge: Arc<Bridge>,
    handle: SessionHandle,
    work: flume::Receiver<Work>,
    frontend: Box<dyn PeerLink<frontend::ServerPacket>>,
    backend: Option<BackendLink>,
    /// Phase of the backend protocol our next outbound packet belongs to.
    backend_phase: ProtocolPhase,
    backend_target: Option<BackendTarget>,
    connection: ConnectionManager,
    identity: Option<ClientIdentity>,
    player: PlayerState,
    caches: SessionCaches,
    ticker: TickScheduler,
    /// The frontend has been sent a world.
    world_sent: bool,
    /// Login continuations still running. Aborted on teardown.
    background: Vec<JoinHandle<()>>,
}

impl Session {
    /// Creates a session for a freshly accepted frontend connection and
    /// registers it with the bridge.
    pub fn new(
        bridge: Arc<Bridge>,
        frontend: Box<dyn PeerLink<frontend::ServerPacket>>,
        context: ExecutionContext,
    ) -> Self {
        let handle = SessionHandle {
            shared: Arc::new(Shared {
                id: SessionId::next(),
                name: OnceCell::new(),
                closed: AtomicBool::new(false),
                work: context.sender,
            }),
        };
        bridge.sessions().insert(handle.clone());
        tracing::debug!("Session {} created", handle.id().as_u64());

        Self {
            bridge,
            handle,
            work: context.receiver,
            frontend,
            backend: None,
            backend_phase: ProtocolPhase::Handshake,
            backend_target: None,
            connection: ConnectionManager::new(),
            identity: None,
            player: PlayerState::new(Instant::now()),
            caches: SessionCaches::new(),
            ticker: TickScheduler::new(),
            world_sent: false,
            background: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.connection.phase()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlayerState {
        &mut self.player
    }

    pub fn caches(&self) -> &SessionCaches {
        &self.caches
    }

    pub fn caches_mut(&mut self) -> &mut SessionCaches {
        &mut self.caches
    }

    pub fn ticker(&self) -> &TickScheduler {
        &self.ticker
    }

    pub fn backend_phase(&self) -> ProtocolPhase {
        self.backend_phase
    }

    pub fn backend_target(&self) -> Option<&BackendTarget> {
        self.backend_target.as_ref()
    }

    /// Name used in log lines.
    pub fn display_name(&self) -> &str {
        self.identity
            .as_ref()
            .map_or("<unknown>", |identity| identity.name.as_str())
    }

    pub fn locale(&self) -> &str {
        self.identity
            .as_ref()
            .map_or(self.bridge.config().default_locale.as_str(), |identity| {
                identity.locale.as_str()
            })
    }

    /// Resolves a message key in this player's locale.
    pub fn translate(&self, key: &str, args: &[&str]) -> String {
        self.bridge.translate(key, self.locale(), args)
    }

    /// Client address for log lines, unless logging it is disabled.
    fn logged_address(&self) -> String {
        if !self.bridge.config().log_player_ip_addresses {
            return "<IP address withheld>".to_owned();
        }
        self.frontend
            .remote_address()
            .map_or_else(|| "<local>".to_owned(), |address| address.ip().to_string())
    }

    pub(crate) fn set_identity(&mut self, identity: ClientIdentity) {
        self.handle.shared.name.set(identity.name.clone()).ok();
        self.identity = Some(identity);
    }

    fn set_phase(&mut self, next: ConnectionPhase) -> bool {
        match self.connection.transition(next) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}: {e}", self.display_name());
                false
            }
        }
    }

    /// Runs `work` right away. A `&mut Session` only exists on the
    /// session loop, so there is nothing to marshal.
    pub fn dispatch(&mut self, work: impl FnOnce(&mut Session)) {
        if self.is_closed() {
            tracing::trace!("Dropping work for closed session {}", self.id().as_u64());
            return;
        }
        work(self);
    }

    pub fn send_frontend(&self, packet: frontend::ServerPacket) {
        if self.is_closed() {
            tracing::trace!("Dropping {} to closed frontend", packet.as_ref());
            return;
        }
        self.frontend.send(packet);
    }

    pub fn send_frontend_immediate(&self, packet: frontend::ServerPacket) {
        if self.is_closed() {
            tracing::trace!("Dropping {} to closed frontend", packet.as_ref());
            return;
        }
        self.frontend.send_immediate(packet);
    }

    /// Sends a packet to the backend if the session is in `required` and
    /// the backend link is in the packet's protocol phase. Anything else
    /// is dropped; phase races around connect and disconnect are normal.
    pub fn send_backend(&self, packet: impl Into<ClientPacket>, required: ConnectionPhase) -> bool {
        let packet = packet.into();
        if self.is_closed() {
            tracing::debug!("Dropping {} to backend: session closed", packet.name());
            return false;
        }
        if self.phase() != required {
            tracing::debug!(
                "Dropping {} to backend: session is {} but {} is required",
                packet.name(),
                self.phase(),
                required
            );
            return false;
        }
        let Some(backend) = &self.backend else {
            tracing::debug!("Dropping {} to backend: not connected", packet.name());
            return false;
        };
        if packet.phase() != self.backend_phase {
            tracing::debug!(
                "Dropping {} to backend: link is in {} phase",
                packet.name(),
                self.backend_phase
            );
            return false;
        }
        backend.send(packet);
        true
    }

    /// Sends a gameplay packet; only goes out once spawned.
    pub fn send_backend_game(&self, packet: impl Into<ClientPacket>) -> bool {
        self.send_backend(packet, ConnectionPhase::Spawned)
    }

    /// Drives the session until it closes: queued work and the tick,
    /// never at the same time.
    pub async fn run(mut self) {
        while !self.is_closed() {
            tokio::select! {
                work = self.work.recv_async() => match work {
                    Ok(work) => self.run_work(work),
                    Err(_) => break,
                },
                () = self.ticker.wait() => {
                    let now = tokio::time::Instant::now().into_std();
                    self.tick_at(now);
                }
            }
        }
        tracing::debug!("Session {} loop finished", self.id().as_u64());
    }

    /// Runs queued work until the queue stays empty for a moment. Does
    /// not tick. Lets tests step a session without a running loop.
    pub async fn run_until_idle(&mut self) {
        const SETTLE: Duration = Duration::from_millis(10);
        while !self.is_closed() {
            match tokio::time::timeout(SETTLE, self.work.recv_async()).await {
                Ok(Ok(work)) => self.run_work(work),
                _ => break,
            }
        }
    }

    fn run_work(&mut self, work: Work) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| work(self))) {
            tracing::error!(
                "Error in task for {}: {}",
                self.display_name(),
                panic_message(&*payload)
            );
        }
    }

    /// Entry point for every packet read from the frontend.
    pub fn handle_frontend_packet(&mut self, packet: frontend::ClientPacket) {
        if self.is_closed() {
            return;
        }
        match packet {
            frontend::ClientPacket::Login(identity) => self.handle_login(identity),
            frontend::ClientPacket::ModalFormResponse { form_id, response } => {
                self.handle_form_response(form_id, response);
            }
            packet => {
                let translators = Arc::clone(self.bridge.translators());
                for translated in translators.translate_frontend(&packet, self) {
                    self.send_backend_game(translated);
                }
            }
        }
    }

    /// Runs one tick as of `now`. A panic inside is logged and does not
    /// stop later ticks.
    pub fn tick_at(&mut self, now: Instant) {
        if self.is_closed() {
            return;
        }
        self.ticker.record_tick();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.run_tick(now))) {
            tracing::error!(
                "Error while ticking {}: {}",
                self.display_name(),
                panic_message(&*payload)
            );
        }
    }

    fn run_tick(&mut self, now: Instant) {
        for (position, finished) in self.caches.pistons.tick() {
            tracing::trace!("Piston at {position:?} finished (extending: {})", finished.extending);
            if let Some(block_state) = self.caches.chunks.block_at(position) {
                self.send_frontend(frontend::ServerPacket::BlockUpdate {
                    position,
                    block_state,
                });
            }
        }
        if let Some(edit) = self.caches.book_edit.take_due(now) {
            self.send_backend_game(play::Packet::EditBook(edit));
        }

        let heartbeat = tick::heartbeat(now, self.player.last_movement, self.player.spawned, || {
            self.bridge
                .collision()
                .adjust_position(self.player.position, self.player.on_ground)
        });
        self.apply_tick_effects(heartbeat.effects(), now);

        if self.caches.world_border.is_resizing() {
            self.caches.world_border.resize_step();
        }
        let border = &self.caches.world_border;
        let position = self.player.position;
        let effects = tick::border_effects(
            border.in_warning_area(),
            border.is_within_warning_boundaries(position),
            border.is_close_to_border(position),
        );
        self.apply_tick_effects(effects, now);

        for (runtime_id, position) in self.caches.entities.tick() {
            self.send_frontend(frontend::ServerPacket::MoveEntity {
                runtime_id,
                position: position.position,
                rotation: position.rotation,
            });
        }

        if self.player.arm_animation_ticks == ARM_SWING_PENDING {
            self.activate_arm_animation();
        }
        let effects = &self.caches.effects;
        let duration =
            tick::arm_swing_duration(effects.haste(), effects.conduit_power(), effects.mining_fatigue());
        let (ticks, effects) =
            tick::arm_swing(self.player.arm_animation_ticks, duration, self.player.is_sneaking());
        self.player.arm_animation_ticks = ticks;
        self.apply_tick_effects(effects, now);
    }

    fn apply_tick_effects(&mut self, effects: Vec<TickEffect>, now: Instant) {
        for effect in effects {
            match effect {
                TickEffect::SendPosition(position) => {
                    self.send_backend_game(play::Packet::SetPlayerPosition(play::SetPlayerPosition {
                        x: position.x,
                        feet_y: position.y,
                        z: position.z,
                        on_ground: self.player.on_ground,
                    }));
                }
                TickEffect::TouchMovement => self.player.last_movement = now,
                TickEffect::EnterBorderFog => {
                    self.caches.world_border.set_in_warning_area(true);
                    self.send_fog(&[WARNING_FOG]);
                }
                TickEffect::ExitBorderFog => {
                    self.remove_fog(&[WARNING_FOG]);
                    self.caches.world_border.set_in_warning_area(false);
                }
                TickEffect::DrawBorderWall => {
                    for position in self.caches.world_border.wall_particles(self.player.position) {
                        self.send_frontend(frontend::ServerPacket::SpawnParticle {
                            identifier: WALL_PARTICLE.to_owned(),
                            position,
                        });
                    }
                }
                TickEffect::AttemptBlock => {
                    if self.attempt_to_block() {
                        self.send_entity_flags();
                    }
                }
            }
        }
    }

    /// Places the player into a world on the frontend. Only the first
    /// call does anything.
    pub fn spawn(&mut self) {
        if self.world_sent {
            return;
        }
        self.world_sent = true;
        let config = self.bridge.config();
        let registries = self.bridge.registries();

        self.send_frontend(frontend::ServerPacket::StartGame(StartGame {
            runtime_id: self.player.runtime_id,
            game_mode: self.player.game_mode,
            position: self.player.position,
            rotation: self.player.rotation,
            dimension: 0,
            world_name: config.server_name.clone(),
            server_authoritative_movement: true,
            custom_items: config.add_non_native_items,
            achievements_disabled: !config.xbox_achievements_enabled,
            command_suggestions: config.command_suggestions,
        }));
        if config.add_non_native_items {
            self.send_frontend(frontend::ServerPacket::ItemComponents(
                registries.item_components.clone(),
            ));
        }

        // Empty chunks around the spawn point get the client off the
        // loading screen before the backend sends real ones.
        let center = self.player.position.block().chunk();
        for x in -1..=1 {
            for z in -1..=1 {
                self.send_frontend(frontend::ServerPacket::LevelChunk {
                    position: ChunkPosition::new(center.x + x, center.z + z),
                    data: Vec::new(),
                });
            }
        }

        self.send_frontend(frontend::ServerPacket::BiomeDefinitions(
            registries.biome_definitions.clone(),
        ));
        self.send_frontend(frontend::ServerPacket::AvailableEntityIdentifiers(
            registries.entity_identifiers.clone(),
        ));
        self.send_frontend(frontend::ServerPacket::CreativeContent(
            registries.creative_content.clone(),
        ));
        self.send_frontend(frontend::ServerPacket::CraftingData(
            registries.crafting_data.clone(),
        ));
        self.send_frontend(frontend::ServerPacket::PlayStatus(PlayStatus::PlayerSpawn));

        // The client runs far too fast until it is told its movement speed.
        self.send_frontend(frontend::ServerPacket::UpdateAttributes {
            runtime_id: self.player.runtime_id,
            attributes: vec![Attribute {
                name: "minecraft:movement".to_owned(),
                value: self.player.walk_speed,
                min: 0.0,
                max: 1024.0,
                default: 0.1,
            }],
        });

        // Health, inventory, spawn position and recipes stay with the backend.
        self.send_frontend(frontend::ServerPacket::GameRulesChanged(vec![
            GameRule::bool("naturalregeneration", false),
            GameRule::bool("keepinventory", true),
            GameRule::int("spawnradius", 0),
            GameRule::bool("recipesunlock", true),
        ]));
    }

    /// Shows `form` and runs `handler` with the pressed button once the
    /// client answers. `None` means the form was closed.
    pub fn show_form(
        &mut self,
        form: Form,
        handler: impl FnOnce(&mut Session, Option<usize>) + Send + 'static,
    ) -> u32 {
        let form_id = self.caches.forms.register(form.clone(), Box::new(handler));
        self.send_frontend(frontend::ServerPacket::ModalForm { form_id, form });
        form_id
    }

    fn handle_form_response(&mut self, form_id: u32, response: Option<usize>) {
        match self.caches.forms.take(form_id) {
            Some((_, handler)) => handler(self, response),
            None => tracing::debug!("{} answered unknown form {form_id}", self.display_name()),
        }
    }

    pub fn send_message(&self, message: impl Into<String>) {
        self.send_frontend(frontend::ServerPacket::Text {
            kind: TextKind::Raw,
            message: message.into(),
        });
    }

    pub fn send_entity_flags(&self) {
        self.send_frontend(frontend::ServerPacket::SetEntityFlags {
            runtime_id: self.player.runtime_id,
            flags: self.player.flags,
        });
    }

    pub fn send_abilities(&self) {
        let command_permission = u8::from(self.player.op_permission_level >= 2);
        self.send_frontend(frontend::ServerPacket::UpdateAbilities {
            runtime_id: self.player.runtime_id,
            command_permission,
            abilities: self.player.abilities,
            fly_speed: self.player.fly_speed,
            walk_speed: self.player.walk_speed,
        });
    }

    /// Raises a shield if the player holds one, main hand first. Returns
    /// whether the player is now blocking; the caller sends the flags.
    pub fn attempt_to_block(&mut self) -> bool {
        let Some(hand) = self.player.shield_hand() else {
            return false;
        };
        let hand = match hand {
            Hand::Main => play::MAIN_HAND,
            Hand::Off => play::OFF_HAND,
        };
        let sequence = self.caches.world.next_prediction_sequence();
        self.send_backend_game(play::Packet::UseItem(play::UseItem { hand, sequence }));
        self.player.set_blocking(true);
        true
    }

    /// Lowers the shield. Returns whether the player was blocking.
    pub fn disable_blocking(&mut self) -> bool {
        if !self.player.is_blocking() {
            return false;
        }
        self.send_backend_game(play::Packet::PlayerAction(play::PlayerAction {
            status: play::PlayerAction::RELEASE_USE_ITEM,
            location: BlockPosition::new(0, 0, 0),
            face: 0,
            sequence: 0,
        }));
        self.player.set_blocking(false);
        true
    }

    pub fn start_sneaking(&mut self) {
        // Sneaking raises the shield unless an arm swing is in progress.
        if self.player.arm_animation_ticks < 0 {
            self.attempt_to_block();
        }
        self.player.set_sneaking(true);
    }

    pub fn stop_sneaking(&mut self) {
        self.disable_blocking();
        self.player.set_sneaking(false);
    }

    /// Marks an arm swing as requested. The next tick starts timing it.
    pub fn arm_swing_pending(&mut self) {
        if self.player.arm_animation_ticks == ARM_SWING_INACTIVE {
            self.player.arm_animation_ticks = ARM_SWING_PENDING;
        }
    }

    /// Starts timing an arm swing. Swinging lowers the shield.
    pub fn activate_arm_animation(&mut self) {
        self.player.arm_animation_ticks = 0;
        if self.disable_blocking() {
            self.send_entity_flags();
        }
    }

    pub fn request_offhand_swap(&mut self) {
        self.send_backend_game(play::Packet::PlayerAction(play::PlayerAction {
            status: play::PlayerAction::SWAP_ITEM_IN_HAND,
            location: BlockPosition::new(0, 0, 0),
            face: 0,
            sequence: 0,
        }));
    }

    pub fn send_fog(&mut self, names: &[&str]) {
        self.player.fog.extend(names.iter().map(|name| (*name).to_owned()));
        self.send_frontend(frontend::ServerPacket::PlayerFog(
            self.player.fog.iter().cloned().collect(),
        ));
    }

    pub fn remove_fog(&mut self, names: &[&str]) {
        if names.is_empty() {
            self.player.fog.clear();
        } else {
            for name in names {
                self.player.fog.remove(*name);
            }
        }
        self.send_frontend(frontend::ServerPacket::PlayerFog(
            self.player.fog.iter().cloned().collect(),
        ));
    }

    pub fn send_game_rule(&self, name: &str, value: GameRuleValue) {
        self.send_frontend(frontend::ServerPacket::GameRulesChanged(vec![GameRule {
            name: name.to_owned(),
            value,
        }]));
    }

    pub fn set_daylight_cycle(&mut self, cycle: bool) {
        self.send_game_rule("dodaylightcycle", GameRuleValue::Bool(cycle));
        self.player.daylight_cycle = cycle;
    }

    /// Sends the coordinates game rule from the current preferences.
    pub fn send_coordinates_rule(&self) {
        let show = self.caches.preferences.show_coordinates();
        self.send_game_rule("showcoordinates", GameRuleValue::Bool(show));
    }

    pub fn set_server_render_distance(&mut self, distance: i32) {
        // One extra chunk; without it the client leaves gaps at the edge.
        let distance = distance + 1;
        self.player.server_render_distance = Some(distance);
        self.send_frontend(frontend::ServerPacket::ChunkRadiusUpdated { radius: distance });
    }

    /// Moves the client to another frontend server. Returns false for an
    /// invalid address.
    pub fn transfer(&self, address: &str, port: u16) -> bool {
        if address.trim().is_empty() || port == 0 {
            tracing::warn!("Refusing to transfer {} to {address}:{port}", self.display_name());
            return false;
        }
        self.send_frontend(frontend::ServerPacket::Transfer {
            address: address.to_owned(),
            port,
        });
        true
    }

    pub fn shake_camera(&self, intensity: f32, duration: f32, kind: CameraShakeKind) {
        self.send_frontend(frontend::ServerPacket::CameraShake {
            intensity,
            duration,
            kind,
            stop: false,
        });
    }

    pub fn stop_camera_shake(&self) {
        self.send_frontend(frontend::ServerPacket::CameraShake {
            intensity: 0.0,
            duration: 0.0,
            kind: CameraShakeKind::Positional,
            stop: true,
        });
    }

    pub fn add_command_enum(&self, name: &str, value: &str) {
        self.update_command_enum(name, SoftEnumAction::Add, value);
    }

    pub fn remove_command_enum(&self, name: &str, value: &str) {
        self.update_command_enum(name, SoftEnumAction::Remove, value);
    }

    fn update_command_enum(&self, name: &str, action: SoftEnumAction, value: &str) {
        if !self.bridge.config().command_suggestions {
            return;
        }
        self.send_frontend(frontend::ServerPacket::UpdateSoftEnum {
            name: name.to_owned(),
            action,
            values: vec![value.to_owned()],
        });
    }

    /// Moves the local player on the frontend and waits for the client
    /// to confirm it.
    pub fn teleport(&mut self, teleport: crate::cache::teleport::Teleport) {
        self.player.position = teleport.position;
        self.player.rotation = teleport.rotation;
        self.caches.teleport.issue(teleport);
        self.send_teleport(&teleport);
    }

    pub(crate) fn send_teleport(&self, teleport: &crate::cache::teleport::Teleport) {
        self.send_frontend(frontend::ServerPacket::MovePlayer {
            runtime_id: self.player.runtime_id,
            position: teleport.position,
            rotation: teleport.rotation,
            mode: MoveMode::Teleport,
            on_ground: self.player.on_ground,
        });
    }

    /// Makes emote pieces available to everyone: each other session is
    /// sent the pieces it did not have yet.
    pub fn refresh_emotes(&mut self, pieces: Vec<String>) {
        self.player.emotes.extend(pieces.iter().cloned());
        for handle in self.bridge.sessions().snapshot() {
            if handle.id() == self.id() {
                continue;
            }
            let pieces = pieces.clone();
            handle.dispatch(move |session| session.receive_emotes(&pieces));
        }
    }

    fn receive_emotes(&mut self, pieces: &[String]) {
        let missing: Vec<String> = pieces
            .iter()
            .filter(|piece| self.player.emotes.insert((*piece).clone()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            self.send_frontend(frontend::ServerPacket::EmoteList {
                runtime_id: self.player.runtime_id,
                pieces: missing,
            });
        }
    }

    /// Runs a login continuation in the background and resumes the
    /// session with its outcome.
    fn spawn_resume(&mut self, future: impl Future<Output = ResumeEvent> + Send + 'static) {
        self.background.retain(|task| !task.is_finished());
        let handle = self.handle.clone();
        self.background.push(tokio::spawn(async move {
            let event = future.await;
            handle.dispatch(move |session| session.resume(event));
        }));
    }

    /// Tears the session down. Safe to call any number of times, from
    /// any phase; only the first call does anything.
    pub fn disconnect(&mut self, reason: &str) {
        if self.phase().is_terminal() {
            return;
        }
        self.connection.set_logged_in(false);
        self.connection.set_logging_in(false);
        if !self.set_phase(ConnectionPhase::Disconnecting) {
            return;
        }

        let mut event = DisconnectEvent {
            name: self.identity.as_ref().map(|identity| identity.name.clone()),
            reason: reason.to_owned(),
        };
        self.bridge.events().on_disconnect(&mut event);
        let reason = event.reason;

        match self.backend.take() {
            Some(backend) => {
                backend.close(&reason);
                tracing::info!(
                    "{} has disconnected from the Java server because of {reason}",
                    self.display_name()
                );
            }
            None => tracing::info!(
                "{} ({}) has disconnected: {reason}",
                self.display_name(),
                self.logged_address()
            ),
        }
        self.frontend.close(&reason);
        self.bridge.sessions().remove(self.id());

        if let Some(identity) = &self.identity {
            if let Some(task) = self.bridge.pending_authentications().get(&identity.xuid) {
                task.set_online(false);
            }
        }
        self.ticker.cancel();
        self.caches.forms.clear();
        for task in self.background.drain(..) {
            task.abort();
        }

        self.set_phase(ConnectionPhase::Closed);
        self.handle.shared.closed.store(true, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ProxyConfig,
        frontend::ServerPacket,
        link::{ChannelLink, LinkMessage, LinkReceiver},
        player::SHIELD,
        position::Vec3,
    };

    fn session() -> (Session, LinkReceiver<ServerPacket>) {
        let bridge = Bridge::builder(ProxyConfig::default()).build();
        let (link, far) = ChannelLink::new(None);
        (Session::new(bridge, Box::new(link), ExecutionContext::new()), far)
    }

    #[test]
    fn registers_on_construction() {
        let (session, _far) = session();
        assert_eq!(session.phase(), ConnectionPhase::Idle);
        assert!(session.bridge().sessions().get(session.id()).is_some());
    }

    #[test]
    fn teardown_is_idempotent() {
        let (mut session, far) = session();
        session.disconnect("bye");
        session.disconnect("again");

        assert!(session.is_closed());
        assert_eq!(session.phase(), ConnectionPhase::Closed);
        assert!(session.bridge().sessions().is_empty());
        let closes = far
            .drain()
            .into_iter()
            .filter(|message| matches!(message, LinkMessage::Close { .. }))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn handle_refuses_work_after_close() {
        let (mut session, _far) = session();
        let handle = session.handle().clone();
        session.disconnect("bye");
        assert!(!handle.dispatch(|_| {}));
    }

    #[test]
    fn backend_packets_need_the_right_phase() {
        let (session, _far) = session();
        let sent = session.send_backend_game(play::Packet::KeepAlive(play::KeepAlive { id: 1 }));
        assert!(!sent);
    }

    #[test]
    fn spawn_is_sent_once() {
        let (mut session, far) = session();
        session.spawn();
        session.spawn();
        let starts = far
            .drain_packets()
            .into_iter()
            .filter(|packet| matches!(packet, ServerPacket::StartGame(_)))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn fog_is_sent_on_entering_and_leaving_the_warning_area() {
        let (mut session, far) = session();
        session.caches_mut().world_border.set_size(20.0);
        session.player_mut().position = Vec3::new(9.5, 64.0, 0.0);

        let now = Instant::now();
        session.tick_at(now);
        session.tick_at(now);
        let fog: Vec<_> = far
            .drain_packets()
            .into_iter()
            .filter_map(|packet| match packet {
                ServerPacket::PlayerFog(fog) => Some(fog),
                _ => None,
            })
            .collect();
        assert_eq!(fog, vec![vec![WARNING_FOG.to_owned()]]);

        session.player_mut().position = Vec3::ZERO;
        session.tick_at(now);
        session.tick_at(now);
        let fog: Vec<_> = far
            .drain_packets()
            .into_iter()
            .filter_map(|packet| match packet {
                ServerPacket::PlayerFog(fog) => Some(fog),
                _ => None,
            })
            .collect();
        assert_eq!(fog, vec![Vec::<String>::new()]);
    }

    #[test]
    fn sneaking_swing_ends_with_shield_raised() {
        let (mut session, far) = session();
        session.player_mut().off_hand = Some(SHIELD.to_owned());
        session.player_mut().set_sneaking(true);
        session.activate_arm_animation();

        let now = Instant::now();
        for _ in 0..6 {
            session.tick_at(now);
        }
        assert!(session.player().is_blocking());
        assert_eq!(session.player().arm_animation_ticks, ARM_SWING_INACTIVE);
        assert!(far.drain_packets().iter().any(|packet| matches!(
            packet,
            ServerPacket::SetEntityFlags { flags, .. } if flags.contains(frontend::EntityFlags::BLOCKING)
        )));
    }

    #[test]
    fn emotes_reach_other_sessions_once() {
        let bridge = Bridge::builder(ProxyConfig::default()).build();
        let (link, _far) = ChannelLink::new(None);
        let mut emoter = Session::new(Arc::clone(&bridge), Box::new(link), ExecutionContext::new());
        let (link, other_far) = ChannelLink::new(None);
        let mut other = Session::new(bridge, Box::new(link), ExecutionContext::new());

        emoter.refresh_emotes(vec!["wave".to_owned()]);
        emoter.refresh_emotes(vec!["wave".to_owned()]);
        while let Ok(work) = other.work.try_recv() {
            other.run_work(work);
        }

        let lists: Vec<_> = other_far
            .drain_packets()
            .into_iter()
            .filter(|packet| matches!(packet, ServerPacket::EmoteList { .. }))
            .collect();
        assert_eq!(lists.len(), 1);
    }

    #[test]
    fn panicking_work_is_contained() {
        let (mut session, _far) = session();
        session.run_work(Box::new(|_| panic!("boom")));
        assert!(!session.is_closed());
    }

    #[test]
    fn device_code_login_needs_an_identity() {
        let (mut session, far) = session();
        session.authenticate_with_device_code();
        assert_eq!(session.phase(), ConnectionPhase::Idle);
        assert!(!session.connection().is_busy());
        assert!(session.bridge().pending_authentications().is_empty());
        assert!(far.drain_packets().is_empty());
    }

    /// Fails the first lookup, then lets positions through unchanged.
    #[derive(Default)]
    struct FlakyCollision {
        failed: std::sync::atomic::AtomicBool,
    }

    impl crate::bridge::CollisionCheck for FlakyCollision {
        fn adjust_position(&self, position: Vec3, _on_ground: bool) -> Option<Vec3> {
            if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                panic!("collision data not loaded");
            }
            Some(position)
        }
    }

    #[test]
    fn failing_tick_keeps_the_session_ticking() {
        let bridge = Bridge::builder(ProxyConfig::default())
            .collision(Arc::new(FlakyCollision::default()))
            .build();
        let (link, far) = ChannelLink::new(None);
        let mut session = Session::new(bridge, Box::new(link), ExecutionContext::new());
        session.caches_mut().world_border.set_size(20.0);
        let start = Instant::now();
        session.player_mut().position = Vec3::new(9.5, 64.0, 0.0);
        session.player_mut().spawned = true;
        session.player_mut().last_movement = start;

        let due = start + Duration::from_secs(4);
        session.tick_at(due);
        assert!(!session.is_closed());
        assert_eq!(session.ticker().ticks(), 1);
        // The heartbeat failed before the border step ran.
        assert!(!far
            .drain_packets()
            .iter()
            .any(|packet| matches!(packet, ServerPacket::PlayerFog(_))));

        let next = due + Duration::from_millis(50);
        session.tick_at(next);
        assert!(!session.is_closed());
        assert_eq!(session.ticker().ticks(), 2);
        assert_eq!(session.player().last_movement, next);
        assert!(far
            .drain_packets()
            .iter()
            .any(|packet| matches!(packet, ServerPacket::PlayerFog(fog) if fog == &[WARNING_FOG.to_owned()])));
    }
}
