use crate::{
    position::BlockPosition,
    protocol::{decoder, Decode, Decoder, Encode, Encoder, RawPacket},
};
use minecraft_bridge_macros::{Decode, Encode};
use uuid::Uuid;

/// Clientbound play packets. Only packets the session keeps state for
/// are parsed; everything else is carried as [`RawPacket`] for the
/// translators.
#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x01)]
    SpawnEntity(SpawnEntity),
    #[encoding(id = 0x07)]
    BlockEntityData(BlockEntityData),
    #[encoding(id = 0x08)]
    BlockAction(BlockAction),
    #[encoding(id = 0x09)]
    BlockUpdate(BlockUpdate),
    #[encoding(id = 0x1b)]
    Disconnect(Disconnect),
    #[encoding(id = 0x1f)]
    UnloadChunk(UnloadChunk),
    #[encoding(id = 0x20)]
    GameEvent(GameEvent),
    #[encoding(id = 0x23)]
    InitializeWorldBorder(InitializeWorldBorder),
    #[encoding(id = 0x24)]
    KeepAlive(KeepAlive),
    #[encoding(id = 0x25)]
    ChunkAndLightData(ChunkAndLightData),
    #[encoding(id = 0x29)]
    Login(Login),
    #[encoding(id = 0x33)]
    Ping(Ping),
    #[encoding(id = 0x36)]
    PlayerAbilities(PlayerAbilities),
    #[encoding(id = 0x3e)]
    SynchronizePlayerPosition(SynchronizePlayerPosition),
    #[encoding(id = 0x40)]
    RemoveEntities(RemoveEntities),
    #[encoding(id = 0x41)]
    RemoveEntityEffect(RemoveEntityEffect),
    #[encoding(id = 0x45)]
    Respawn(Respawn),
    #[encoding(id = 0x4b)]
    SetWorldBorderCenter(SetWorldBorderCenter),
    #[encoding(id = 0x4c)]
    SetWorldBorderLerpSize(SetWorldBorderLerpSize),
    #[encoding(id = 0x4d)]
    SetWorldBorderSize(SetWorldBorderSize),
    #[encoding(id = 0x4e)]
    SetWorldBorderWarningDelay(SetWorldBorderWarningDelay),
    #[encoding(id = 0x4f)]
    SetWorldBorderWarningDistance(SetWorldBorderWarningDistance),
    #[encoding(id = 0x58)]
    SetEntityVelocity(SetEntityVelocity),
    #[encoding(id = 0x5b)]
    SetHealth(SetHealth),
    #[encoding(id = 0x62)]
    UpdateTime(UpdateTime),
    #[encoding(id = 0x67)]
    StartConfiguration(StartConfiguration),
    #[encoding(id = 0x6d)]
    TeleportEntity(TeleportEntity),
    #[encoding(id = 0x70)]
    UpdateAdvancements(UpdateAdvancements),
    #[encoding(id = 0x72)]
    EntityEffect(EntityEffect),
    #[encoding(id = 0x73)]
    UpdateRecipes(UpdateRecipes),
    #[encoding(id = 0x74)]
    UpdateTags(UpdateTags),
    #[encoding(fallback)]
    Other(RawPacket),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnEntity {
    #[encoding(varint)]
    pub entity_id: i32,
    pub uuid: Uuid,
    #[encoding(varint)]
    pub kind: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[encoding(angle)]
    pub pitch: f32,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub head_yaw: f32,
    #[encoding(varint)]
    pub data: i32,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub velocity_z: i16,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BlockEntityData {
    pub location: BlockPosition,
    #[encoding(varint)]
    pub kind: i32,
    #[encoding(length_prefix = "inferred")]
    pub nbt: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BlockAction {
    pub location: BlockPosition,
    pub action_id: u8,
    pub action_parameter: u8,
    #[encoding(varint)]
    pub block_type: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BlockUpdate {
    pub location: BlockPosition,
    #[encoding(varint)]
    pub block_id: i32,
}

/// Play and configuration disconnect. Since 1.20.3 the reason is a
/// network NBT text component.
#[derive(Debug, Clone, Encode, Decode)]
pub struct Disconnect {
    #[encoding(length_prefix = "inferred")]
    pub reason: Vec<u8>,
}

impl Disconnect {
    /// Extracts plain text from the reason when it is a bare string tag
    /// or a compound with a top-level `text` entry.
    pub fn plain_reason(&self) -> Option<String> {
        const TAG_END: u8 = 0;
        const TAG_STRING: u8 = 8;
        const TAG_COMPOUND: u8 = 10;

        let mut decoder = Decoder::new(&self.reason);
        match decoder.read_u8().ok()? {
            TAG_STRING => read_nbt_string(&mut decoder),
            TAG_COMPOUND => loop {
                let tag = decoder.read_u8().ok()?;
                if tag == TAG_END {
                    break None;
                }
                let name = read_nbt_string(&mut decoder)?;
                if tag == TAG_STRING {
                    let value = read_nbt_string(&mut decoder)?;
                    if name == "text" {
                        break Some(value);
                    }
                } else {
                    // Nested values are not walked.
                    break None;
                }
            },
            _ => None,
        }
    }
}

fn read_nbt_string(decoder: &mut Decoder) -> Option<String> {
    let length = usize::from(decoder.read_u16().ok()?);
    let bytes = decoder.consume_slice(length).ok()?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UnloadChunk {
    pub chunk_z: i32,
    pub chunk_x: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct GameEvent {
    pub event: u8,
    pub value: f32,
}

impl GameEvent {
    pub const END_RAIN: u8 = 1;
    pub const BEGIN_RAIN: u8 = 2;
    pub const CHANGE_GAME_MODE: u8 = 3;
    pub const RAIN_LEVEL_CHANGE: u8 = 7;
    pub const THUNDER_LEVEL_CHANGE: u8 = 8;
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct InitializeWorldBorder {
    pub x: f64,
    pub z: f64,
    pub old_diameter: f64,
    pub new_diameter: f64,
    #[encoding(varlong)]
    pub speed_millis: i64,
    #[encoding(varint)]
    pub portal_teleport_boundary: i32,
    #[encoding(varint)]
    pub warning_blocks: i32,
    #[encoding(varint)]
    pub warning_time: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct KeepAlive {
    pub id: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChunkAndLightData {
    pub chunk_x: i32,
    pub chunk_z: i32,
    #[encoding(length_prefix = "inferred")]
    pub ignored_data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Login {
    pub entity_id: i32,
    pub is_hardcore: bool,
    #[encoding(length_prefix = "varint")]
    pub dimension_names: Vec<String>,
    #[encoding(varint)]
    pub max_players: i32,
    #[encoding(varint)]
    pub view_distance: i32,
    #[encoding(varint)]
    pub simulation_distance: i32,
    pub reduced_debug_info: bool,
    pub enable_respawn_screen: bool,
    pub do_limited_crafting: bool,
    pub dimension_type: String,
    pub dimension_name: String,
    pub hashed_seed: i64,
    pub game_mode: u8,
    pub previous_game_mode: i8,
    #[encoding(length_prefix = "inferred")]
    pub ignored_data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ping {
    pub id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerAbilities {
    pub flags: i8,
    pub flying_speed: f32,
    pub field_of_view_modifier: f32,
}

impl PlayerAbilities {
    pub const INVULNERABLE: i8 = 0x01;
    pub const FLYING: i8 = 0x02;
    pub const ALLOW_FLYING: i8 = 0x04;
    pub const INSTANT_BREAK: i8 = 0x08;
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SynchronizePlayerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    /// Bit set of relative axes.
    pub flags: u8,
    #[encoding(varint)]
    pub teleport_id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct RemoveEntities {
    #[encoding(length_prefix = "varint", varint_items)]
    pub entities: Vec<i32>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct RemoveEntityEffect {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(varint)]
    pub effect_id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Respawn {
    pub dimension_type: String,
    pub dimension_name: String,
    pub hashed_seed: i64,
    pub game_mode: u8,
    pub previous_game_mode: i8,
    #[encoding(length_prefix = "inferred")]
    pub ignored_data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetWorldBorderCenter {
    pub x: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetWorldBorderLerpSize {
    pub old_diameter: f64,
    pub new_diameter: f64,
    #[encoding(varlong)]
    pub speed_millis: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetWorldBorderSize {
    pub diameter: f64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetWorldBorderWarningDelay {
    #[encoding(varint)]
    pub warning_time: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetWorldBorderWarningDistance {
    #[encoding(varint)]
    pub warning_blocks: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetEntityVelocity {
    #[encoding(varint)]
    pub entity_id: i32,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub velocity_z: i16,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetHealth {
    pub health: f32,
    #[encoding(varint)]
    pub food: i32,
    pub saturation: f32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateTime {
    pub world_age: i64,
    pub time_of_day: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct StartConfiguration;

#[derive(Debug, Clone, Encode, Decode)]
pub struct TeleportEntity {
    #[encoding(varint)]
    pub entity_id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub pitch: f32,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateAdvancements {
    pub reset: bool,
    #[encoding(length_prefix = "inferred")]
    pub ignored_data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityEffect {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(varint)]
    pub effect_id: i32,
    pub amplifier: i8,
    #[encoding(varint)]
    pub duration: i32,
    #[encoding(length_prefix = "inferred")]
    pub ignored_data: Vec<u8>,
}

/// Recipe definitions are handed to the translators unparsed.
#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateRecipes {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

/// Tags grouped by registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTags {
    pub registries: Vec<TagRegistry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRegistry {
    pub registry: String,
    pub tags: Vec<(String, Vec<i32>)>,
}

impl Encode for UpdateTags {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_int(self.registries.len().try_into().unwrap_or(i32::MAX));
        for registry in &self.registries {
            encoder.write_string(&registry.registry);
            encoder.write_var_int(registry.tags.len().try_into().unwrap_or(i32::MAX));
            for (name, entries) in &registry.tags {
                encoder.write_string(name);
                encoder.write_var_int(entries.len().try_into().unwrap_or(i32::MAX));
                for &entry in entries {
                    encoder.write_var_int(entry);
                }
            }
        }
    }
}

impl Decode for UpdateTags {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let registry_count = decoder.read_var_int()?;
        let mut registries = Vec::new();
        for _ in 0..registry_count {
            let registry = String::decode(decoder)?;
            let tag_count = decoder.read_var_int()?;
            let mut tags = Vec::new();
            for _ in 0..tag_count {
                let name = String::decode(decoder)?;
                let entry_count = decoder.read_var_int()?;
                let mut entries = Vec::new();
                for _ in 0..entry_count {
                    entries.push(decoder.read_var_int()?);
                }
                tags.push((name, entries));
            }
            registries.push(TagRegistry { registry, tags });
        }
        Ok(Self { registries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Packet {
        Packet::decode(&mut Decoder::new(bytes)).unwrap()
    }

    #[test]
    fn unknown_ids_fall_back_to_raw() {
        match decode(&[0x6a, 1, 2, 3]) {
            Packet::Other(raw) => {
                assert_eq!(raw.id, 0x6a);
                assert_eq!(raw.data, vec![1, 2, 3]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn remove_entities_uses_varints() {
        let mut buf = Vec::new();
        Packet::RemoveEntities(RemoveEntities {
            entities: vec![1, 300],
        })
        .encode(&mut Encoder::new(&mut buf));
        assert_eq!(buf, vec![0x40, 2, 1, 0xac, 0x02]);
    }

    #[test]
    fn disconnect_reason_from_string_tag() {
        let mut reason = vec![8, 0, 6];
        reason.extend_from_slice(b"Kicked");
        let disconnect = Disconnect { reason };
        assert_eq!(disconnect.plain_reason().as_deref(), Some("Kicked"));
    }

    #[test]
    fn disconnect_reason_from_compound() {
        let mut reason = vec![10, 8, 0, 4];
        reason.extend_from_slice(b"text");
        reason.extend_from_slice(&[0, 2]);
        reason.extend_from_slice(b"no");
        reason.push(0);
        let disconnect = Disconnect { reason };
        assert_eq!(disconnect.plain_reason().as_deref(), Some("no"));
    }
}
