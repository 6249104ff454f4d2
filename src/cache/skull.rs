use crate::position::{BlockPosition, ChunkPosition};
use ahash::AHashMap;
use mini_moka::unsync::Cache;
use std::time::Duration;

/// How long a resolved texture is kept after its last use.
const TEXTURE_IDLE_DURATION: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skull {
    /// Texture hash from the owner's profile, if the skull has one.
    pub texture: Option<String>,
}

/// Player heads placed in loaded chunks, and the skin data resolved for
/// their textures.
pub struct SkullCache {
    skulls: AHashMap<BlockPosition, Skull>,
    textures: Cache<String, String>,
}

impl Default for SkullCache {
    fn default() -> Self {
        Self {
            skulls: AHashMap::new(),
            textures: Cache::builder()
                .time_to_idle(TEXTURE_IDLE_DURATION)
                .build(),
        }
    }
}

impl SkullCache {
    pub fn put(&mut self, position: BlockPosition, skull: Skull) {
        self.skulls.insert(position, skull);
    }

    pub fn remove(&mut self, position: BlockPosition) -> Option<Skull> {
        self.skulls.remove(&position)
    }

    pub fn get(&self, position: BlockPosition) -> Option<&Skull> {
        self.skulls.get(&position)
    }

    pub fn unload_chunk(&mut self, chunk: ChunkPosition) {
        self.skulls.retain(|position, _| position.chunk() != chunk);
    }

    pub fn cache_texture(&mut self, hash: String, skin: String) {
        self.textures.insert(hash, skin);
    }

    pub fn texture(&mut self, hash: &str) -> Option<String> {
        self.textures.get(&hash.to_owned()).cloned()
    }

    pub fn len(&self) -> usize {
        self.skulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skulls.is_empty()
    }

    /// Forgets placed skulls. Resolved textures survive a world change.
    pub fn clear(&mut self) {
        self.skulls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_unload_removes_skulls() {
        let mut cache = SkullCache::default();
        let inside = BlockPosition::new(1, 70, 1);
        let outside = BlockPosition::new(17, 70, 1);
        cache.put(inside, Skull { texture: None });
        cache.put(outside, Skull { texture: None });
        cache.unload_chunk(inside.chunk());
        assert!(cache.get(inside).is_none());
        assert!(cache.get(outside).is_some());

        cache.cache_texture("abc".to_owned(), "skin".to_owned());
        assert_eq!(cache.texture("abc").as_deref(), Some("skin"));
    }
}
