use crate::position::BlockPosition;
use ahash::AHashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LodestoneTarget {
    pub position: BlockPosition,
    pub dimension: String,
}

/// Lodestone compasses need a tracking id on the frontend. Ids are
/// handed out per distinct target and reused.
#[derive(Debug)]
pub struct LodestoneCache {
    ids: AHashMap<LodestoneTarget, i32>,
    next_id: i32,
}

impl Default for LodestoneCache {
    fn default() -> Self {
        Self {
            ids: AHashMap::new(),
            // 0 means "no target" to the client.
            next_id: 1,
        }
    }
}

impl LodestoneCache {
    pub fn tracking_id(&mut self, target: LodestoneTarget) -> i32 {
        if let Some(&id) = self.ids.get(&target) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(target, id);
        id
    }

    pub fn target(&self, id: i32) -> Option<&LodestoneTarget> {
        self.ids
            .iter()
            .find_map(|(target, &tracked)| (tracked == id).then_some(target))
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_target_same_id() {
        let mut cache = LodestoneCache::default();
        let target = LodestoneTarget {
            position: BlockPosition::new(1, 2, 3),
            dimension: "minecraft:overworld".to_owned(),
        };
        let id = cache.tracking_id(target.clone());
        assert_eq!(cache.tracking_id(target.clone()), id);
        assert_eq!(cache.target(id), Some(&target));
        assert_ne!(id, 0);
    }
}
