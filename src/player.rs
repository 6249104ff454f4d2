//! Per-player state the session keeps on behalf of the local player.

use crate::{
    entity_id::{EntityId, RuntimeId},
    frontend::{Abilities, EntityFlags},
    position::{BlockPosition, Rotation, Vec3},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, time::Instant};
use uuid::Uuid;

pub const SHIELD: &str = "minecraft:shield";

/// Fallback when neither side has announced a render distance.
const DEFAULT_RENDER_DISTANCE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    /// Maps the backend's game mode byte. Unknown values fall back to survival.
    pub fn from_java(id: u8) -> Self {
        match id {
            1 => GameMode::Creative,
            2 => GameMode::Adventure,
            3 => GameMode::Spectator,
            _ => GameMode::Survival,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Pose {
    #[default]
    Standing,
    Sneaking,
    Swimming,
    FallFlying,
    Sleeping,
}

impl Pose {
    pub fn eye_height(self) -> f64 {
        match self {
            Pose::Standing => 1.62,
            Pose::Sneaking => 1.27,
            Pose::Swimming | Pose::FallFlying => 0.4,
            Pose::Sleeping => 0.2,
        }
    }
}

/// Arm swing counter value while no swing is being timed.
pub const ARM_SWING_INACTIVE: i32 = -1;
/// Arm swing counter value while a swing was requested but not started.
pub const ARM_SWING_PENDING: i32 = -2;

#[derive(Debug, Clone)]
pub struct PlayerState {
    /// Profile id on the backend. Nil until the backend accepted the login.
    pub uuid: Uuid,
    pub username: String,
    pub entity_id: EntityId,
    pub runtime_id: RuntimeId,
    pub position: Vec3,
    pub rotation: Rotation,
    pub on_ground: bool,
    /// The client reported that it finished loading the world.
    pub spawned: bool,
    pub game_mode: GameMode,
    pub pose: Pose,
    pub flags: EntityFlags,
    pub abilities: Abilities,
    pub can_fly: bool,
    pub fly_speed: f32,
    pub walk_speed: f32,
    pub health: f32,
    pub dimension: String,
    pub client_render_distance: Option<i32>,
    pub server_render_distance: Option<i32>,
    pub reduced_debug_info: bool,
    pub daylight_cycle: bool,
    pub op_permission_level: u8,
    /// Last time a position was sent to the backend.
    pub last_movement: Instant,
    pub last_interaction: Option<(BlockPosition, Instant)>,
    pub last_hit: Option<Instant>,
    /// Ticks since the current arm swing started.
    pub arm_animation_ticks: i32,
    /// Fog effects currently applied on the client.
    pub fog: BTreeSet<String>,
    pub main_hand: Option<String>,
    pub off_hand: Option<String>,
    pub emotes: BTreeSet<String>,
}

impl PlayerState {
    pub fn new(now: Instant) -> Self {
        Self {
            uuid: Uuid::nil(),
            username: String::new(),
            entity_id: EntityId::new(0),
            runtime_id: RuntimeId::LOCAL_PLAYER,
            position: Vec3::ZERO,
            rotation: Rotation::default(),
            on_ground: false,
            spawned: false,
            game_mode: GameMode::Survival,
            pose: Pose::Standing,
            flags: EntityFlags::empty(),
            abilities: Abilities::BUILD | Abilities::MINE | Abilities::ATTACK_PLAYERS,
            can_fly: false,
            fly_speed: 0.05,
            walk_speed: 0.1,
            health: 20.0,
            dimension: "minecraft:overworld".to_owned(),
            client_render_distance: None,
            server_render_distance: None,
            reduced_debug_info: false,
            daylight_cycle: true,
            op_permission_level: 0,
            last_movement: now,
            last_interaction: None,
            last_hit: None,
            arm_animation_ticks: ARM_SWING_INACTIVE,
            fog: BTreeSet::new(),
            main_hand: None,
            off_hand: None,
            emotes: BTreeSet::new(),
        }
    }

    /// Client choice wins, then the server's, then a small default.
    pub fn render_distance(&self) -> i32 {
        self.client_render_distance
            .or(self.server_render_distance)
            .unwrap_or(DEFAULT_RENDER_DISTANCE)
    }

    pub fn is_sneaking(&self) -> bool {
        self.flags.contains(EntityFlags::SNEAKING)
    }

    pub fn set_sneaking(&mut self, sneaking: bool) {
        self.flags.set(EntityFlags::SNEAKING, sneaking);
        self.pose = if sneaking {
            Pose::Sneaking
        } else {
            Pose::Standing
        };
    }

    pub fn is_sprinting(&self) -> bool {
        self.flags.contains(EntityFlags::SPRINTING)
    }

    pub fn set_sprinting(&mut self, sprinting: bool) {
        self.flags.set(EntityFlags::SPRINTING, sprinting);
    }

    pub fn is_flying(&self) -> bool {
        self.abilities.contains(Abilities::FLYING)
    }

    pub fn set_flying(&mut self, flying: bool) {
        self.abilities.set(Abilities::FLYING, flying);
    }

    pub fn is_blocking(&self) -> bool {
        self.flags.contains(EntityFlags::BLOCKING)
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.flags.set(EntityFlags::BLOCKING, blocking);
    }

    /// Hand holding a shield, main hand first.
    pub fn shield_hand(&self) -> Option<Hand> {
        if self.main_hand.as_deref() == Some(SHIELD) {
            Some(Hand::Main)
        } else if self.off_hand.as_deref() == Some(SHIELD) {
            Some(Hand::Off)
        } else {
            None
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        Vec3::new(
            self.position.x,
            self.position.y + self.pose.eye_height(),
            self.position.z,
        )
    }

    /// Applies a game mode change from the backend.
    pub fn set_game_mode(&mut self, game_mode: GameMode) {
        self.game_mode = game_mode;
        let creative = game_mode == GameMode::Creative;
        let spectator = game_mode == GameMode::Spectator;
        self.can_fly = creative || spectator;
        self.abilities.set(Abilities::MAY_FLY, self.can_fly);
        self.abilities.set(Abilities::INSTABUILD, creative);
        self.abilities.set(Abilities::NO_CLIP, spectator);
        self.abilities
            .set(Abilities::BUILD | Abilities::MINE, game_mode != GameMode::Adventure && !spectator);
        if !self.can_fly {
            self.set_flying(false);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Main,
    Off,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_distance_precedence() {
        let mut player = PlayerState::new(Instant::now());
        assert_eq!(player.render_distance(), 2);
        player.server_render_distance = Some(10);
        assert_eq!(player.render_distance(), 10);
        player.client_render_distance = Some(6);
        assert_eq!(player.render_distance(), 6);
    }

    #[test]
    fn shield_prefers_main_hand() {
        let mut player = PlayerState::new(Instant::now());
        assert_eq!(player.shield_hand(), None);
        player.off_hand = Some(SHIELD.to_owned());
        assert_eq!(player.shield_hand(), Some(Hand::Off));
        player.main_hand = Some(SHIELD.to_owned());
        assert_eq!(player.shield_hand(), Some(Hand::Main));
    }

    #[test]
    fn survival_drops_flight() {
        let mut player = PlayerState::new(Instant::now());
        player.set_game_mode(GameMode::Creative);
        player.set_flying(true);
        assert!(player.can_fly);
        player.set_game_mode(GameMode::Survival);
        assert!(!player.is_flying());
        assert!(!player.abilities.contains(Abilities::MAY_FLY));
    }
}
