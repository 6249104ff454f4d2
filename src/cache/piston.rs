use crate::position::BlockPosition;
use ahash::AHashMap;

/// Game ticks a piston takes to finish moving.
pub const PISTON_MOVE_TICKS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PistonMove {
    pub extending: bool,
    pub elapsed: u8,
}

/// Pistons currently in motion. Drained once per tick.
#[derive(Debug, Default)]
pub struct PistonCache {
    moving: AHashMap<BlockPosition, PistonMove>,
}

impl PistonCache {
    pub fn start(&mut self, position: BlockPosition, extending: bool) {
        self.moving.insert(
            position,
            PistonMove {
                extending,
                elapsed: 0,
            },
        );
    }

    pub fn is_moving(&self, position: BlockPosition) -> bool {
        self.moving.contains_key(&position)
    }

    /// Advances every piston by one tick and returns the ones that
    /// finished, sorted by position.
    pub fn tick(&mut self) -> Vec<(BlockPosition, PistonMove)> {
        let mut finished = Vec::new();
        self.moving.retain(|&position, piston| {
            piston.elapsed += 1;
            if piston.elapsed >= PISTON_MOVE_TICKS {
                finished.push((position, *piston));
                false
            } else {
                true
            }
        });
        finished.sort_by_key(|(position, _)| *position);
        finished
    }

    pub fn is_empty(&self) -> bool {
        self.moving.is_empty()
    }

    pub fn clear(&mut self) {
        self.moving.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finishes_after_move_ticks() {
        let mut cache = PistonCache::default();
        let position = BlockPosition::new(0, 64, 0);
        cache.start(position, true);
        assert!(cache.tick().is_empty());
        let finished = cache.tick();
        assert_eq!(finished.len(), 1);
        assert!(finished[0].1.extending);
        assert!(cache.is_empty());
    }
}
