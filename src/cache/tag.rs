use crate::protocol::packet::server::play::UpdateTags;
use ahash::{AHashMap, AHashSet};

/// Block and item tags as last sent by the backend.
#[derive(Debug, Default)]
pub struct TagCache {
    tags: AHashMap<(String, String), AHashSet<i32>>,
}

impl TagCache {
    /// Replaces all tags.
    pub fn load(&mut self, packet: &UpdateTags) {
        self.tags.clear();
        for registry in &packet.registries {
            for (name, entries) in &registry.tags {
                self.tags.insert(
                    (registry.registry.clone(), name.clone()),
                    entries.iter().copied().collect(),
                );
            }
        }
    }

    pub fn contains(&self, registry: &str, tag: &str, id: i32) -> bool {
        self.tags
            .get(&(registry.to_owned(), tag.to_owned()))
            .is_some_and(|entries| entries.contains(&id))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::server::play::TagRegistry;

    #[test]
    fn load_replaces_previous_tags() {
        let mut cache = TagCache::default();
        let packet = |id| UpdateTags {
            registries: vec![TagRegistry {
                registry: "minecraft:block".to_owned(),
                tags: vec![("minecraft:logs".to_owned(), vec![id])],
            }],
        };
        cache.load(&packet(5));
        assert!(cache.contains("minecraft:block", "minecraft:logs", 5));
        cache.load(&packet(6));
        assert!(!cache.contains("minecraft:block", "minecraft:logs", 5));
        assert!(cache.contains("minecraft:block", "minecraft:logs", 6));
    }
}
