//! Packet translation between the two protocols.
//!
//! Translators run on the session loop with full access to the session,
//! so they keep the caches in step with what each side has been told.
//! The standard set only covers packets the session itself keeps state
//! for; embedders with a full protocol mapping plug in their own.

use crate::{
    cache::{skull::Skull, teleport::Teleport},
    command,
    entity_id::EntityId,
    frontend::{self, LevelEvent, PlayerAction},
    player::{GameMode, Pose, ARM_SWING_INACTIVE},
    position::{velocity_from_wire, ChunkPosition, EntityPosition, Rotation, Vec3},
    protocol::packet::{
        client::play as client_play,
        server::{configuration as server_configuration, play},
        ClientPacket, ServerPacket,
    },
    session::Session,
};
use std::{
    sync::Arc,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

/// Prefix of commands handled by the bridge instead of the backend.
pub const BRIDGE_COMMAND: &str = "bridge";

/// Block entity type id of player heads.
const SKULL_BLOCK_ENTITY: i32 = 15;
/// Block action id a piston uses for extending.
const PISTON_EXTEND: u8 = 0;
const PISTON_RETRACT: u8 = 1;

pub trait PacketTranslators: Send + Sync {
    /// Translates a packet from the backend into packets for the frontend.
    fn translate_backend(&self, packet: &ServerPacket, session: &mut Session) -> Vec<frontend::ServerPacket>;

    /// Translates a packet from the frontend into packets for the backend.
    fn translate_frontend(&self, packet: &frontend::ClientPacket, session: &mut Session) -> Vec<ClientPacket>;
}

/// Translations for everything the session engine tracks.
pub struct StandardTranslators;

impl PacketTranslators for StandardTranslators {
    fn translate_backend(&self, packet: &ServerPacket, session: &mut Session) -> Vec<frontend::ServerPacket> {
        match packet {
            ServerPacket::Play(packet) => translate_play(packet, session),
            ServerPacket::Configuration(server_configuration::Packet::UpdateTags(tags)) => {
                session.caches_mut().tags.load(tags);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn translate_frontend(&self, packet: &frontend::ClientPacket, session: &mut Session) -> Vec<ClientPacket> {
        use frontend::ClientPacket as Packet;

        match packet {
            Packet::SetLocalPlayerAsInitialized => {
                session.player_mut().spawned = true;
                session.player_mut().last_movement = Instant::now();
                Vec::new()
            }
            Packet::RequestChunkRadius { radius } => {
                session.player_mut().client_render_distance = Some(*radius);
                let radius = session.player().render_distance();
                session.send_frontend(frontend::ServerPacket::ChunkRadiusUpdated { radius });
                session.send_client_information();
                Vec::new()
            }
            Packet::MovePlayer {
                position,
                rotation,
                on_ground,
            } => translate_movement(*position, *rotation, *on_ground, session),
            Packet::Text { message } => {
                vec![client_play::Packet::ChatMessage(client_play::ChatMessage::unsigned(
                    message.clone(),
                    timestamp(),
                ))
                .into()]
            }
            Packet::CommandRequest { command: line } => {
                let line = line.trim_start_matches('/');
                let mut argv = line.split_whitespace();
                if argv.next() == Some(BRIDGE_COMMAND) {
                    let argv: Vec<&str> = argv.collect();
                    let bridge = Arc::clone(session.bridge());
                    command::execute(&bridge, session, &argv);
                    return Vec::new();
                }
                vec![client_play::Packet::ChatCommand(client_play::ChatCommand::unsigned(
                    line,
                    timestamp(),
                ))
                .into()]
            }
            Packet::Animate => {
                session.arm_swing_pending();
                vec![client_play::Packet::SwingArm(client_play::SwingArm {
                    hand: client_play::MAIN_HAND,
                })
                .into()]
            }
            Packet::PlayerAction(action) => translate_action(*action, session),
            Packet::BookEdit { slot, pages, title } => {
                session.caches_mut().book_edit.set(client_play::EditBook {
                    slot: *slot,
                    pages: pages.clone(),
                    title: title.clone(),
                });
                Vec::new()
            }
            Packet::Emote { piece } => {
                let runtime_id = session.player().runtime_id;
                let piece = piece.clone();
                for handle in session.bridge().sessions().snapshot() {
                    if handle.id() == session.id() {
                        continue;
                    }
                    let piece = piece.clone();
                    handle.dispatch(move |other| {
                        other.send_frontend(frontend::ServerPacket::Emote { runtime_id, piece });
                    });
                }
                Vec::new()
            }
            Packet::AdvancementTab { tab } => {
                if !session.caches_mut().advancements.set_current_tab(tab.clone()) {
                    return Vec::new();
                }
                let seen = match tab {
                    Some(tab) => client_play::SeenAdvancements::OpenedTab(tab.clone()),
                    None => client_play::SeenAdvancements::ClosedScreen,
                };
                vec![client_play::Packet::SeenAdvancements(seen).into()]
            }
            Packet::Login(_) | Packet::ModalFormResponse { .. } => Vec::new(),
        }
    }
}

fn timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

fn translate_movement(position: Vec3, rotation: Rotation, on_ground: bool, session: &mut Session) -> Vec<ClientPacket> {
    use crate::cache::teleport::TeleportCheck;

    match session.caches_mut().teleport.check(position) {
        TeleportCheck::Waiting => return Vec::new(),
        TeleportCheck::Resend(teleport) => {
            tracing::debug!("Resending teleport {} to {}", teleport.teleport_id, session.display_name());
            session.send_teleport(&teleport);
            return Vec::new();
        }
        TeleportCheck::Clear | TeleportCheck::Confirmed(_) => {}
    }

    let player = session.player_mut();
    player.position = position;
    player.rotation = rotation;
    player.on_ground = on_ground;
    player.last_movement = Instant::now();
    vec![client_play::Packet::SetPlayerPositionAndRotation(client_play::SetPlayerPositionAndRotation {
        x: position.x,
        feet_y: position.y,
        z: position.z,
        yaw: rotation.yaw,
        pitch: rotation.pitch,
        on_ground,
    })
    .into()]
}

fn translate_action(action: PlayerAction, session: &mut Session) -> Vec<ClientPacket> {
    let entity_id = session.player().entity_id.as_i32();
    let command = |action| -> Vec<ClientPacket> {
        vec![client_play::Packet::PlayerCommand(client_play::PlayerCommand {
            entity_id,
            action,
            jump_boost: 0,
        })
        .into()]
    };
    let dig = |session: &mut Session, status, location| -> Vec<ClientPacket> {
        let sequence = session.caches_mut().world.next_prediction_sequence();
        vec![client_play::Packet::PlayerAction(client_play::PlayerAction {
            status,
            location,
            face: 1,
            sequence,
        })
        .into()]
    };

    match action {
        PlayerAction::StartSneak => {
            session.start_sneaking();
            session.send_entity_flags();
            command(client_play::PlayerCommand::START_SNEAKING)
        }
        PlayerAction::StopSneak => {
            session.stop_sneaking();
            session.send_entity_flags();
            command(client_play::PlayerCommand::STOP_SNEAKING)
        }
        PlayerAction::StartSprint => {
            session.player_mut().set_sprinting(true);
            command(client_play::PlayerCommand::START_SPRINTING)
        }
        PlayerAction::StopSprint => {
            session.player_mut().set_sprinting(false);
            command(client_play::PlayerCommand::STOP_SPRINTING)
        }
        PlayerAction::StartSwimming => {
            session.player_mut().pose = Pose::Swimming;
            Vec::new()
        }
        PlayerAction::StopSwimming => {
            session.player_mut().pose = Pose::Standing;
            Vec::new()
        }
        PlayerAction::StartFlying | PlayerAction::StopFlying => {
            let flying = action == PlayerAction::StartFlying;
            if flying && !session.player().can_fly {
                // Put the client back on the ground.
                session.send_abilities();
                return Vec::new();
            }
            session.player_mut().set_flying(flying);
            let flags = if flying { client_play::PlayerAbilities::FLYING } else { 0 };
            vec![client_play::Packet::PlayerAbilities(client_play::PlayerAbilities { flags }).into()]
        }
        PlayerAction::Respawn => {
            vec![client_play::Packet::ClientStatus(client_play::ClientStatus {
                action: client_play::ClientStatus::PERFORM_RESPAWN,
            })
            .into()]
        }
        PlayerAction::StartBreak(position) => {
            session.player_mut().last_interaction = Some((position, Instant::now()));
            dig(session, client_play::PlayerAction::START_DIGGING, position)
        }
        PlayerAction::AbortBreak(position) => dig(session, client_play::PlayerAction::CANCELLED_DIGGING, position),
        PlayerAction::StopBreak(position) => dig(session, client_play::PlayerAction::FINISHED_DIGGING, position),
        PlayerAction::SwapOffhand => {
            session.request_offhand_swap();
            Vec::new()
        }
    }
}

fn translate_play(packet: &play::Packet, session: &mut Session) -> Vec<frontend::ServerPacket> {
    use play::Packet;

    match packet {
        Packet::Login(login) => {
            let game_mode = GameMode::from_java(login.game_mode);
            let player = session.player_mut();
            player.entity_id = EntityId::new(login.entity_id);
            player.dimension = login.dimension_name.clone();
            player.reduced_debug_info = login.reduced_debug_info;
            player.set_game_mode(game_mode);
            session.caches_mut().preferences.server_allows_coordinates = !login.reduced_debug_info;
            session.send_coordinates_rule();
            session.set_server_render_distance(login.view_distance);
            session.send_abilities();
            vec![frontend::ServerPacket::SetPlayerGameType(game_mode)]
        }
        Packet::Respawn(respawn) => {
            if respawn.dimension_name != session.player().dimension {
                tracing::debug!(
                    "{} changes dimension to {}",
                    session.display_name(),
                    respawn.dimension_name
                );
                session.caches_mut().clear_world();
                session.player_mut().dimension = respawn.dimension_name.clone();
            }
            session.caches_mut().effects.clear();
            let game_mode = GameMode::from_java(respawn.game_mode);
            session.player_mut().set_game_mode(game_mode);
            session.player_mut().arm_animation_ticks = ARM_SWING_INACTIVE;
            session.send_abilities();
            vec![frontend::ServerPacket::SetPlayerGameType(game_mode)]
        }
        Packet::SpawnEntity(spawn) => {
            let position = EntityPosition::from((spawn.x, spawn.y, spawn.z, spawn.pitch, spawn.yaw));
            let velocity = velocity_from_wire(spawn.velocity_x, spawn.velocity_y, spawn.velocity_z);
            let runtime_id = session.caches_mut().entities.spawn(
                EntityId::new(spawn.entity_id),
                spawn.uuid,
                spawn.kind,
                position,
                velocity,
            );
            vec![frontend::ServerPacket::AddEntity {
                runtime_id,
                kind: spawn.kind,
                position: position.position,
                velocity,
            }]
        }
        Packet::RemoveEntities(remove) => remove
            .entities
            .iter()
            .filter_map(|&id| session.caches_mut().entities.remove(EntityId::new(id)))
            .map(|entity| frontend::ServerPacket::RemoveEntity {
                runtime_id: entity.runtime_id,
            })
            .collect(),
        Packet::TeleportEntity(teleport) => {
            let position = EntityPosition::from((teleport.x, teleport.y, teleport.z, teleport.pitch, teleport.yaw));
            match session
                .caches_mut()
                .entities
                .teleport(EntityId::new(teleport.entity_id), position)
            {
                Some(entity) => vec![frontend::ServerPacket::MoveEntity {
                    runtime_id: entity.runtime_id,
                    position: position.position,
                    rotation: position.rotation,
                }],
                None => Vec::new(),
            }
        }
        Packet::SetEntityVelocity(velocity) => {
            let value = velocity_from_wire(velocity.velocity_x, velocity.velocity_y, velocity.velocity_z);
            session
                .caches_mut()
                .entities
                .set_velocity(EntityId::new(velocity.entity_id), value);
            Vec::new()
        }
        Packet::EntityEffect(effect) if effect.entity_id == session.player().entity_id.as_i32() => {
            session.caches_mut().effects.apply(effect.effect_id, effect.amplifier);
            Vec::new()
        }
        Packet::RemoveEntityEffect(effect) if effect.entity_id == session.player().entity_id.as_i32() => {
            session.caches_mut().effects.remove(effect.effect_id);
            Vec::new()
        }
        Packet::ChunkAndLightData(chunk) => {
            let position = ChunkPosition::new(chunk.chunk_x, chunk.chunk_z);
            session.caches_mut().chunks.load(position);
            vec![frontend::ServerPacket::LevelChunk {
                position,
                data: Vec::new(),
            }]
        }
        Packet::UnloadChunk(unload) => {
            let position = ChunkPosition::new(unload.chunk_x, unload.chunk_z);
            let caches = session.caches_mut();
            caches.chunks.unload(position);
            caches.skulls.unload_chunk(position);
            Vec::new()
        }
        Packet::BlockUpdate(update) => {
            if session.caches_mut().chunks.update_block(update.location, update.block_id) {
                vec![frontend::ServerPacket::BlockUpdate {
                    position: update.location,
                    block_state: update.block_id,
                }]
            } else {
                Vec::new()
            }
        }
        Packet::BlockAction(action) => {
            if action.action_id == PISTON_EXTEND || action.action_id == PISTON_RETRACT {
                session
                    .caches_mut()
                    .pistons
                    .start(action.location, action.action_id == PISTON_EXTEND);
            }
            Vec::new()
        }
        Packet::BlockEntityData(data) if data.kind == SKULL_BLOCK_ENTITY => {
            session.caches_mut().skulls.put(data.location, Skull { texture: None });
            Vec::new()
        }
        Packet::GameEvent(event) => translate_game_event(event, session),
        Packet::InitializeWorldBorder(border) => {
            session.caches_mut().world_border.initialize(border);
            Vec::new()
        }
        Packet::SetWorldBorderCenter(center) => {
            session.caches_mut().world_border.set_center(center.x, center.z);
            Vec::new()
        }
        Packet::SetWorldBorderLerpSize(lerp) => {
            session
                .caches_mut()
                .world_border
                .lerp(lerp.old_diameter, lerp.new_diameter, lerp.speed_millis);
            Vec::new()
        }
        Packet::SetWorldBorderSize(size) => {
            session.caches_mut().world_border.set_size(size.diameter);
            Vec::new()
        }
        Packet::SetWorldBorderWarningDelay(delay) => {
            session.caches_mut().world_border.set_warning_time(delay.warning_time);
            Vec::new()
        }
        Packet::SetWorldBorderWarningDistance(distance) => {
            session
                .caches_mut()
                .world_border
                .set_warning_blocks(distance.warning_blocks);
            Vec::new()
        }
        Packet::PlayerAbilities(abilities) => {
            let flags = abilities.flags;
            let player = session.player_mut();
            player.can_fly = flags & play::PlayerAbilities::ALLOW_FLYING != 0;
            player.set_flying(flags & play::PlayerAbilities::FLYING != 0);
            player.fly_speed = abilities.flying_speed;
            player.abilities.set(
                frontend::Abilities::MAY_FLY,
                flags & play::PlayerAbilities::ALLOW_FLYING != 0,
            );
            player.abilities.set(
                frontend::Abilities::INVULNERABLE,
                flags & play::PlayerAbilities::INVULNERABLE != 0,
            );
            session.send_abilities();
            Vec::new()
        }
        Packet::SynchronizePlayerPosition(sync) => {
            session.teleport(Teleport {
                position: Vec3::new(sync.x, sync.y, sync.z),
                rotation: Rotation {
                    yaw: sync.yaw,
                    pitch: sync.pitch,
                },
                teleport_id: sync.teleport_id,
            });
            session.send_backend_game(client_play::Packet::ConfirmTeleportation(
                client_play::ConfirmTeleportation {
                    teleport_id: sync.teleport_id,
                },
            ));
            Vec::new()
        }
        Packet::SetHealth(health) => {
            session.player_mut().health = health.health;
            vec![frontend::ServerPacket::SetHealth { health: health.health }]
        }
        Packet::UpdateTime(time) => {
            let world = &mut session.caches_mut().world;
            world.world_age = time.world_age;
            world.time_of_day = time.time_of_day;
            // A negative time of day means the backend froze the cycle.
            let cycle = time.time_of_day >= 0;
            if cycle != session.player().daylight_cycle {
                session.set_daylight_cycle(cycle);
            }
            let time = i32::try_from(time.time_of_day.unsigned_abs() % 24000).unwrap_or(0);
            vec![frontend::ServerPacket::SetTime { time }]
        }
        Packet::UpdateAdvancements(update) => {
            if update.reset {
                session.caches_mut().advancements.reset();
            }
            Vec::new()
        }
        Packet::UpdateRecipes(recipes) => {
            session.caches_mut().recipes.replace(recipes.data.clone());
            Vec::new()
        }
        Packet::UpdateTags(tags) => {
            session.caches_mut().tags.load(tags);
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn translate_game_event(event: &play::GameEvent, session: &mut Session) -> Vec<frontend::ServerPacket> {
    let position = session.player().position;
    let level_event = |event, data| frontend::ServerPacket::LevelEvent { event, position, data };
    let weather = &mut session.caches_mut().weather;

    match event.event {
        play::GameEvent::BEGIN_RAIN => {
            weather.raining = true;
            vec![level_event(LevelEvent::StartRaining, 65535)]
        }
        play::GameEvent::END_RAIN => {
            weather.raining = false;
            weather.rain_strength = 0.0;
            vec![
                level_event(LevelEvent::StopRaining, 0),
                level_event(LevelEvent::StopThunderstorm, 0),
            ]
        }
        play::GameEvent::RAIN_LEVEL_CHANGE => {
            weather.rain_strength = event.value;
            vec![level_event(LevelEvent::StartRaining, (event.value * 65535.0) as i32)]
        }
        play::GameEvent::THUNDER_LEVEL_CHANGE => {
            weather.thunder_strength = event.value;
            if event.value > 0.0 {
                vec![level_event(LevelEvent::StartThunderstorm, (event.value * 65535.0) as i32)]
            } else {
                vec![level_event(LevelEvent::StopThunderstorm, 0)]
            }
        }
        play::GameEvent::CHANGE_GAME_MODE => {
            let game_mode = GameMode::from_java(event.value as u8);
            session.player_mut().set_game_mode(game_mode);
            session.send_abilities();
            vec![frontend::ServerPacket::SetPlayerGameType(game_mode)]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bridge::Bridge,
        config::ProxyConfig,
        frontend::MoveMode,
        link::{ChannelLink, LinkReceiver},
        position::BlockPosition,
        session::ExecutionContext,
    };

    fn session() -> (Session, LinkReceiver<frontend::ServerPacket>) {
        let bridge = Bridge::builder(ProxyConfig::default()).build();
        let (link, far) = ChannelLink::new(None);
        (Session::new(bridge, Box::new(link), ExecutionContext::new()), far)
    }

    #[test]
    fn movement_waits_for_teleport_confirmation() {
        let (mut session, far) = session();
        session.teleport(Teleport {
            position: Vec3::new(100.0, 70.0, 100.0),
            rotation: Rotation::default(),
            teleport_id: 3,
        });
        far.drain();

        let away = Vec3::new(0.0, 70.0, 0.0);
        for _ in 1..crate::cache::teleport::RESEND_THRESHOLD {
            assert!(translate_movement(away, Rotation::default(), true, &mut session).is_empty());
        }
        assert!(far.drain_packets().is_empty());

        assert!(translate_movement(away, Rotation::default(), true, &mut session).is_empty());
        let resent = far.drain_packets();
        assert_eq!(resent.len(), 1);
        assert!(matches!(
            resent[0],
            frontend::ServerPacket::MovePlayer {
                mode: MoveMode::Teleport,
                ..
            }
        ));

        let confirmed = translate_movement(Vec3::new(100.0, 70.0, 100.0), Rotation::default(), true, &mut session);
        assert_eq!(confirmed.len(), 1);
        assert!(session.caches().teleport.outstanding().is_none());
    }

    #[test]
    fn dimension_change_clears_world() {
        let (mut session, _far) = session();
        let chunk = ChunkPosition::new(0, 0);
        session.caches_mut().chunks.load(chunk);

        let respawn = play::Packet::Respawn(play::Respawn {
            dimension_type: "minecraft:the_nether".to_owned(),
            dimension_name: "minecraft:the_nether".to_owned(),
            hashed_seed: 0,
            game_mode: 1,
            previous_game_mode: -1,
            ignored_data: Vec::new(),
        });
        let out = translate_play(&respawn, &mut session);

        assert!(!session.caches().chunks.is_loaded(chunk));
        assert_eq!(session.player().dimension, "minecraft:the_nether");
        assert_eq!(out, vec![frontend::ServerPacket::SetPlayerGameType(GameMode::Creative)]);
    }

    #[test]
    fn piston_finish_resends_block() {
        let (mut session, far) = session();
        let block = BlockPosition::new(1, 64, 1);
        session.caches_mut().chunks.load(block.chunk());
        session.caches_mut().chunks.update_block(block, 42);
        translate_play(
            &play::Packet::BlockAction(play::BlockAction {
                location: block,
                action_id: PISTON_EXTEND,
                action_parameter: 0,
                block_type: 0,
            }),
            &mut session,
        );

        let now = Instant::now();
        session.tick_at(now);
        session.tick_at(now);
        assert!(far.drain_packets().contains(&frontend::ServerPacket::BlockUpdate {
            position: block,
            block_state: 42,
        }));
    }

    #[test]
    fn advancement_tab_sent_on_change_only() {
        let (mut session, _far) = session();
        let open = frontend::ClientPacket::AdvancementTab {
            tab: Some("minecraft:story/root".to_owned()),
        };
        assert_eq!(StandardTranslators.translate_frontend(&open, &mut session).len(), 1);
        assert!(StandardTranslators.translate_frontend(&open, &mut session).is_empty());
    }

    #[test]
    fn skull_heads_tracked_until_unload() {
        let (mut session, _far) = session();
        let block = BlockPosition::new(3, 70, 3);
        translate_play(
            &play::Packet::BlockEntityData(play::BlockEntityData {
                location: block,
                kind: SKULL_BLOCK_ENTITY,
                nbt: Vec::new(),
            }),
            &mut session,
        );
        assert!(session.caches().skulls.get(block).is_some());

        translate_play(
            &play::Packet::UnloadChunk(play::UnloadChunk {
                chunk_z: 0,
                chunk_x: 0,
            }),
            &mut session,
        );
        assert!(session.caches().skulls.get(block).is_none());
    }

    #[test]
    fn frozen_time_of_day_is_folded_into_one_day() {
        let (mut session, _far) = session();
        let frozen = |time_of_day| {
            play::Packet::UpdateTime(play::UpdateTime {
                world_age: 1,
                time_of_day,
            })
        };

        let out = translate_play(&frozen(-30_000), &mut session);
        assert_eq!(out, vec![frontend::ServerPacket::SetTime { time: 6000 }]);
        assert!(!session.player().daylight_cycle);

        let out = translate_play(&frozen(i64::MIN), &mut session);
        assert_eq!(out, vec![frontend::ServerPacket::SetTime { time: 7808 }]);
        assert_eq!(session.caches().world.time_of_day, i64::MIN);
    }

    #[test]
    fn config_tags_are_cached() {
        let (mut session, _far) = session();
        let packet = ServerPacket::Configuration(server_configuration::Packet::UpdateTags(play::UpdateTags {
            registries: vec![play::TagRegistry {
                registry: "minecraft:block".to_owned(),
                tags: vec![("minecraft:logs".to_owned(), vec![1, 2])],
            }],
        }));
        StandardTranslators.translate_backend(&packet, &mut session);
        assert!(session.caches().tags.contains("minecraft:block", "minecraft:logs", 2));
    }
}
