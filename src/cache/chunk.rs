use crate::position::{BlockPosition, ChunkPosition};
use ahash::{AHashMap, AHashSet};

/// Which chunks the client has loaded, plus block states the backend
/// has updated individually since.
#[derive(Debug, Default)]
pub struct ChunkCache {
    loaded: AHashSet<ChunkPosition>,
    blocks: AHashMap<BlockPosition, i32>,
}

impl ChunkCache {
    pub fn load(&mut self, position: ChunkPosition) {
        self.loaded.insert(position);
    }

    /// Returns whether the chunk was loaded.
    pub fn unload(&mut self, position: ChunkPosition) -> bool {
        self.blocks.retain(|block, _| block.chunk() != position);
        self.loaded.remove(&position)
    }

    pub fn is_loaded(&self, position: ChunkPosition) -> bool {
        self.loaded.contains(&position)
    }

    /// Records a block change. Updates to unloaded chunks are dropped.
    pub fn update_block(&mut self, position: BlockPosition, state: i32) -> bool {
        if !self.is_loaded(position.chunk()) {
            tracing::trace!("Ignoring block update in unloaded chunk at {position:?}");
            return false;
        }
        self.blocks.insert(position, state);
        true
    }

    pub fn block_at(&self, position: BlockPosition) -> Option<i32> {
        self.blocks.get(&position).copied()
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
        self.blocks.clear();
    }
}
