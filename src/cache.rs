//! Per-session state caches, populated by the packet translators and
//! read by the tick scheduler and the session's helpers.

pub mod advancement;
pub mod book_edit;
pub mod chunk;
pub mod effect;
pub mod entity;
pub mod form;
pub mod lodestone;
pub mod piston;
pub mod preferences;
pub mod recipe;
pub mod skull;
pub mod tag;
pub mod teleport;
pub mod weather;
pub mod world;
pub mod world_border;

/// Every cache a session owns. Created together with the session and
/// dropped with it.
#[derive(Default)]
pub struct SessionCaches {
    pub advancements: advancement::AdvancementCache,
    pub book_edit: book_edit::BookEditCache,
    pub chunks: chunk::ChunkCache,
    pub effects: effect::EffectCache,
    pub entities: entity::EntityCache,
    pub forms: form::FormCache,
    pub lodestones: lodestone::LodestoneCache,
    pub pistons: piston::PistonCache,
    pub preferences: preferences::PreferencesCache,
    pub recipes: recipe::RecipeCache,
    pub skulls: skull::SkullCache,
    pub tags: tag::TagCache,
    pub teleport: teleport::TeleportCache,
    pub weather: weather::WeatherCache,
    pub world: world::WorldCache,
    pub world_border: world_border::WorldBorder,
}

impl SessionCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything tied to the current dimension. Called on
    /// respawn into a different world.
    pub fn clear_world(&mut self) {
        self.chunks.clear();
        self.entities.clear();
        self.pistons.clear();
        self.skulls.clear();
        self.lodestones.clear();
        self.teleport.clear();
    }
}
