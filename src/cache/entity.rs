use crate::{
    entity_id::{EntityId, RuntimeId, RuntimeIdAllocator},
    position::{EntityPosition, Vec3},
};
use ahash::AHashMap;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Velocity multiplier applied each tick to entities moved locally.
const DRAG: f64 = 0.98;
/// Below this speed a locally moved entity is considered at rest.
const REST_SPEED_SQUARED: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntity {
    pub entity_id: EntityId,
    pub runtime_id: RuntimeId,
    pub uuid: Uuid,
    pub kind: i32,
    pub position: EntityPosition,
    pub velocity: Vec3,
}

/// Entities the client knows about, with the runtime ids they were
/// given on the frontend.
#[derive(Debug, Default)]
pub struct EntityCache {
    entities: AHashMap<EntityId, CachedEntity>,
    /// Ordered so every tick visits entities in the same order.
    tickable: BTreeSet<EntityId>,
    runtime_ids: RuntimeIdAllocator,
}

impl EntityCache {
    pub fn spawn(
        &mut self,
        entity_id: EntityId,
        uuid: Uuid,
        kind: i32,
        position: EntityPosition,
        velocity: Vec3,
    ) -> RuntimeId {
        // A respawned id keeps its runtime id so the client sees one entity.
        let runtime_id = match self.entities.get(&entity_id) {
            Some(existing) => existing.runtime_id,
            None => self.runtime_ids.allocate(),
        };
        self.entities.insert(
            entity_id,
            CachedEntity {
                entity_id,
                runtime_id,
                uuid,
                kind,
                position,
                velocity,
            },
        );
        self.update_tickable(entity_id);
        runtime_id
    }

    pub fn remove(&mut self, entity_id: EntityId) -> Option<CachedEntity> {
        self.tickable.remove(&entity_id);
        self.entities.remove(&entity_id)
    }

    pub fn get(&self, entity_id: EntityId) -> Option<&CachedEntity> {
        self.entities.get(&entity_id)
    }

    pub fn teleport(&mut self, entity_id: EntityId, position: EntityPosition) -> Option<&CachedEntity> {
        let entity = self.entities.get_mut(&entity_id)?;
        entity.position = position;
        Some(entity)
    }

    pub fn set_velocity(&mut self, entity_id: EntityId, velocity: Vec3) -> bool {
        let Some(entity) = self.entities.get_mut(&entity_id) else {
            return false;
        };
        entity.velocity = velocity;
        self.update_tickable(entity_id);
        true
    }

    fn update_tickable(&mut self, entity_id: EntityId) {
        let moving = self
            .entities
            .get(&entity_id)
            .is_some_and(|entity| entity.velocity.distance_squared(Vec3::ZERO) > REST_SPEED_SQUARED);
        if moving {
            self.tickable.insert(entity_id);
        } else {
            self.tickable.remove(&entity_id);
        }
    }

    pub fn is_tickable(&self, entity_id: EntityId) -> bool {
        self.tickable.contains(&entity_id)
    }

    /// Advances every moving entity by one tick and returns the new
    /// positions, in entity id order.
    pub fn tick(&mut self) -> Vec<(RuntimeId, EntityPosition)> {
        let mut moved = Vec::with_capacity(self.tickable.len());
        let mut resting = Vec::new();
        for entity_id in &self.tickable {
            let Some(entity) = self.entities.get_mut(entity_id) else {
                continue;
            };
            entity.position.position += entity.velocity;
            entity.velocity = Vec3::new(
                entity.velocity.x * DRAG,
                entity.velocity.y * DRAG,
                entity.velocity.z * DRAG,
            );
            moved.push((entity.runtime_id, entity.position));
            if entity.velocity.distance_squared(Vec3::ZERO) <= REST_SPEED_SQUARED {
                resting.push(*entity_id);
            }
        }
        for entity_id in resting {
            self.tickable.remove(&entity_id);
        }
        moved
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.tickable.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_in_id_order() {
        let mut cache = EntityCache::default();
        let velocity = Vec3::new(1.0, 0.0, 0.0);
        let late = cache.spawn(EntityId::new(9), Uuid::nil(), 0, Default::default(), velocity);
        let early = cache.spawn(EntityId::new(3), Uuid::nil(), 0, Default::default(), velocity);
        cache.spawn(EntityId::new(5), Uuid::nil(), 0, Default::default(), Vec3::ZERO);

        let moved = cache.tick();
        let order: Vec<_> = moved.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![early, late]);
        assert_eq!(moved[0].1.position.x, 1.0);
    }

    #[test]
    fn respawn_keeps_runtime_id() {
        let mut cache = EntityCache::default();
        let first = cache.spawn(EntityId::new(1), Uuid::nil(), 0, Default::default(), Vec3::ZERO);
        let second = cache.spawn(EntityId::new(1), Uuid::nil(), 0, Default::default(), Vec3::ZERO);
        assert_eq!(first, second);
        assert_ne!(first, RuntimeId::LOCAL_PLAYER);
    }

    #[test]
    fn stopping_removes_from_tick_set() {
        let mut cache = EntityCache::default();
        let id = EntityId::new(4);
        cache.spawn(id, Uuid::nil(), 0, Default::default(), Vec3::new(0.0, 1.0, 0.0));
        assert!(cache.is_tickable(id));
        cache.set_velocity(id, Vec3::ZERO);
        assert!(!cache.is_tickable(id));
        assert!(cache.tick().is_empty());
    }
}
