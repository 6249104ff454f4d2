use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub x: i32,
    pub z: i32,
}

impl ChunkPosition {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPosition {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn chunk(self) -> ChunkPosition {
        ChunkPosition {
            x: self.x.div_euclid(16),
            z: self.z.div_euclid(16),
        }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// A point in the world, in blocks.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn block(self) -> BlockPosition {
        BlockPosition::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    pub fn distance_squared(self, other: Vec3) -> f64 {
        let d = self - other;
        d.x * d.x + d.y * d.y + d.z * d.z
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct EntityPosition {
    pub position: Vec3,
    pub rotation: Rotation,
}

impl From<(f64, f64, f64, f32, f32)> for EntityPosition {
    fn from(value: (f64, f64, f64, f32, f32)) -> Self {
        let (x, y, z, pitch, yaw) = value;
        Self {
            position: Vec3::new(x, y, z),
            rotation: Rotation { yaw, pitch },
        }
    }
}

/// Converts a wire velocity (1/8000 block per tick) to blocks per tick.
pub fn velocity_from_wire(x: i16, y: i16, z: i16) -> Vec3 {
    Vec3::new(
        f64::from(x) / 8000.0,
        f64::from(y) / 8000.0,
        f64::from(z) / 8000.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_blocks_map_to_negative_chunks() {
        assert_eq!(BlockPosition::new(-1, 0, 15).chunk(), ChunkPosition::new(-1, 0));
        assert_eq!(BlockPosition::new(16, 0, -17).chunk(), ChunkPosition::new(1, -2));
    }

    #[test]
    fn floor_to_block() {
        assert_eq!(Vec3::new(-0.5, 64.9, 3.0).block(), BlockPosition::new(-1, 64, 3));
    }
}
