//! The world border as the backend describes it, plus the client-side
//! effects the frontend needs to see it: there is no native border on
//! the frontend, so it is drawn with particles and a warning fog.

use crate::{position::Vec3, protocol::packet::server::play::InitializeWorldBorder};

/// Distance from the edge at which the wall starts being drawn even
/// outside the warning area.
pub const CLOSE_TO_BORDER: f64 = 5.0;
/// Fog applied while the player is inside the warning area.
pub const WARNING_FOG: &str = "minecraft:fog_crimson_forest";
pub const WALL_PARTICLE: &str = "minecraft:deny_block";

const TICK_MILLIS: i64 = 50;
const DEFAULT_DIAMETER: f64 = 59_999_968.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Resize {
    old_diameter: f64,
    new_diameter: f64,
    total_ticks: u32,
    elapsed_ticks: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldBorder {
    center_x: f64,
    center_z: f64,
    diameter: f64,
    resize: Option<Resize>,
    warning_blocks: i32,
    /// Seconds of border movement that still count as a warning.
    warning_time: i32,
    /// Whether the warning fog is currently applied.
    in_warning_area: bool,
}

impl Default for WorldBorder {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_z: 0.0,
            diameter: DEFAULT_DIAMETER,
            resize: None,
            warning_blocks: 5,
            warning_time: 15,
            in_warning_area: false,
        }
    }
}

impl WorldBorder {
    pub fn initialize(&mut self, packet: &InitializeWorldBorder) {
        self.set_center(packet.x, packet.z);
        self.warning_blocks = packet.warning_blocks;
        self.warning_time = packet.warning_time;
        self.lerp(packet.old_diameter, packet.new_diameter, packet.speed_millis);
    }

    pub fn set_center(&mut self, x: f64, z: f64) {
        self.center_x = x;
        self.center_z = z;
    }

    /// Sets the size immediately, cancelling any resize.
    pub fn set_size(&mut self, diameter: f64) {
        self.diameter = diameter;
        self.resize = None;
    }

    /// Starts a gradual resize over `speed_millis`.
    pub fn lerp(&mut self, old_diameter: f64, new_diameter: f64, speed_millis: i64) {
        let total_ticks = u32::try_from(speed_millis / TICK_MILLIS).unwrap_or(u32::MAX);
        if total_ticks == 0 || old_diameter == new_diameter {
            self.set_size(new_diameter);
            return;
        }
        self.diameter = old_diameter;
        self.resize = Some(Resize {
            old_diameter,
            new_diameter,
            total_ticks,
            elapsed_ticks: 0,
        });
    }

    pub fn set_warning_blocks(&mut self, blocks: i32) {
        self.warning_blocks = blocks;
    }

    pub fn set_warning_time(&mut self, seconds: i32) {
        self.warning_time = seconds;
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_x, self.center_z)
    }

    pub fn is_resizing(&self) -> bool {
        self.resize.is_some()
    }

    /// Advances an ongoing resize by one tick.
    pub fn resize_step(&mut self) {
        let Some(resize) = &mut self.resize else {
            return;
        };
        resize.elapsed_ticks += 1;
        if resize.elapsed_ticks >= resize.total_ticks {
            self.diameter = resize.new_diameter;
            self.resize = None;
        } else {
            let progress = f64::from(resize.elapsed_ticks) / f64::from(resize.total_ticks);
            self.diameter =
                resize.old_diameter + (resize.new_diameter - resize.old_diameter) * progress;
        }
    }

    /// `(min_x, min_z, max_x, max_z)` of the current border.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let radius = self.diameter / 2.0;
        (
            self.center_x - radius,
            self.center_z - radius,
            self.center_x + radius,
            self.center_z + radius,
        )
    }

    /// Width of the warning band. While shrinking, it also covers the
    /// distance the border will travel in `warning_time` seconds.
    pub fn warning_distance(&self) -> f64 {
        let blocks = f64::from(self.warning_blocks);
        match self.resize {
            Some(resize) if resize.new_diameter < resize.old_diameter => {
                let per_tick = (resize.old_diameter - resize.new_diameter)
                    / 2.0
                    / f64::from(resize.total_ticks);
                let ticks = f64::from(self.warning_time) * 1000.0 / TICK_MILLIS as f64;
                blocks.max(per_tick * ticks)
            }
            _ => blocks,
        }
    }

    /// Distance from `position` to the nearest edge; negative outside.
    pub fn distance_to_edge(&self, position: Vec3) -> f64 {
        let (min_x, min_z, max_x, max_z) = self.bounds();
        (position.x - min_x)
            .min(max_x - position.x)
            .min(position.z - min_z)
            .min(max_z - position.z)
    }

    pub fn is_inside(&self, position: Vec3) -> bool {
        self.distance_to_edge(position) > 0.0
    }

    /// True while the player is clear of the warning band.
    pub fn is_within_warning_boundaries(&self, position: Vec3) -> bool {
        self.distance_to_edge(position) > self.warning_distance()
    }

    pub fn is_close_to_border(&self, position: Vec3) -> bool {
        self.distance_to_edge(position) < CLOSE_TO_BORDER
    }

    pub fn in_warning_area(&self) -> bool {
        self.in_warning_area
    }

    pub fn set_in_warning_area(&mut self, in_area: bool) {
        self.in_warning_area = in_area;
    }

    /// Particle positions outlining each edge within reach of `position`.
    pub fn wall_particles(&self, position: Vec3) -> Vec<Vec3> {
        let (min_x, min_z, max_x, max_z) = self.bounds();
        let mut particles = Vec::new();
        let base_y = position.y.floor();

        for (edge_x, near) in [(min_x, position.x - min_x), (max_x, max_x - position.x)] {
            if near < CLOSE_TO_BORDER {
                for offset in (-4..=4).step_by(2) {
                    let z = (position.z.floor() + f64::from(offset)).clamp(min_z, max_z);
                    for dy in 0..3 {
                        particles.push(Vec3::new(edge_x, base_y + f64::from(dy), z));
                    }
                }
            }
        }
        for (edge_z, near) in [(min_z, position.z - min_z), (max_z, max_z - position.z)] {
            if near < CLOSE_TO_BORDER {
                for offset in (-4..=4).step_by(2) {
                    let x = (position.x.floor() + f64::from(offset)).clamp(min_x, max_x);
                    for dy in 0..3 {
                        particles.push(Vec3::new(x, base_y + f64::from(dy), edge_z));
                    }
                }
            }
        }
        particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn border(diameter: f64) -> WorldBorder {
        let mut border = WorldBorder::default();
        border.initialize(&InitializeWorldBorder {
            x: 0.0,
            z: 0.0,
            old_diameter: diameter,
            new_diameter: diameter,
            speed_millis: 0,
            portal_teleport_boundary: 29_999_984,
            warning_blocks: 5,
            warning_time: 15,
        });
        border
    }

    #[test]
    fn lerps_one_step_per_tick() {
        let mut border = WorldBorder::default();
        border.lerp(100.0, 50.0, 200);
        assert!(border.is_resizing());
        border.resize_step();
        assert_eq!(border.diameter(), 87.5);
        for _ in 0..3 {
            border.resize_step();
        }
        assert_eq!(border.diameter(), 50.0);
        assert!(!border.is_resizing());
    }

    #[test]
    fn warning_band() {
        let border = border(100.0);
        assert!(border.is_within_warning_boundaries(Vec3::new(0.0, 64.0, 0.0)));
        assert!(!border.is_within_warning_boundaries(Vec3::new(47.0, 64.0, 0.0)));
        assert!(border.is_close_to_border(Vec3::new(0.0, 64.0, -46.0)));
        assert!(!border.is_inside(Vec3::new(60.0, 64.0, 0.0)));
    }

    #[test]
    fn wall_only_on_near_edges() {
        let border = border(100.0);
        assert!(border.wall_particles(Vec3::ZERO).is_empty());
        let particles = border.wall_particles(Vec3::new(48.0, 64.0, 0.0));
        assert_eq!(particles.len(), 15);
        assert!(particles.iter().all(|p| p.x == 50.0));
    }
}
