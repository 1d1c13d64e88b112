//! Obstacle queries consumed by path planning
//!
//! Physics is not simulated here. Planners only need to know whether a
//! straight move between two points is clear, which the host provides
//! through [`ObstacleQuery`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Bitmask selecting which obstacle layers a query tests against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Matches nothing
    pub const NONE: Self = Self(0);
    /// Matches every layer
    pub const ALL: Self = Self(u32::MAX);
    /// Static level geometry
    pub const STATIC: Self = Self(1);

    /// Check whether the two masks share a layer
    #[must_use]
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Shape and filter of a movement query (a capsule swept along a segment)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    /// Agent radius
    pub radius: f32,
    /// Layers counted as obstacles
    pub layers: LayerMask,
}

impl Probe {
    /// Create a probe
    #[must_use]
    pub const fn new(radius: f32, layers: LayerMask) -> Self {
        Self { radius, layers }
    }
}

impl Default for Probe {
    fn default() -> Self {
        Self::new(0.25, LayerMask::ALL)
    }
}

/// Line-of-sight / sweep query against the world's obstacles
pub trait ObstacleQuery {
    /// Sweep `probe` from `start` to `end`; return the distance to the first
    /// hit, or `None` when the way is clear.
    fn cast(&self, start: Vec3, end: Vec3, probe: &Probe) -> Option<f32>;

    /// Check whether an agent can move straight from `start` to `end`
    fn can_move_between(&self, start: Vec3, end: Vec3, probe: &Probe) -> bool {
        self.cast(start, end, probe).is_none()
    }
}

/// A world without obstacles
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSpace;

impl ObstacleQuery for OpenSpace {
    fn cast(&self, _start: Vec3, _end: Vec3, _probe: &Probe) -> Option<f32> {
        None
    }
}

/// Spherical obstacles, handy for tests and simple scenes
#[derive(Debug, Clone, Default)]
pub struct SphereObstacles {
    spheres: Vec<(Vec3, f32, LayerMask)>,
}

impl SphereObstacles {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sphere on the given layer
    pub fn add(&mut self, center: Vec3, radius: f32, layer: LayerMask) {
        self.spheres.push((center, radius, layer));
    }
}

impl ObstacleQuery for SphereObstacles {
    fn cast(&self, start: Vec3, end: Vec3, probe: &Probe) -> Option<f32> {
        let delta = end - start;
        let length = delta.length();
        let dir = delta.normalize_or_zero();

        self.spheres
            .iter()
            .filter(|(_, _, layer)| layer.intersects(probe.layers))
            .filter_map(|&(center, radius, _)| {
                // Closest approach of the segment to the sphere center
                let t = (center - start).dot(dir).clamp(0.0, length);
                let closest = start + dir * t;
                let reach = radius + probe.radius;
                let miss = closest.distance_squared(center);
                if miss > reach * reach {
                    return None;
                }
                let back = (reach * reach - miss).sqrt();
                Some((t - back).max(0.0))
            })
            .min_by(f32::total_cmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_mask() {
        assert!(LayerMask::ALL.intersects(LayerMask::STATIC));
        assert!(!LayerMask::NONE.intersects(LayerMask::STATIC));
        assert!(!LayerMask(2).intersects(LayerMask(1)));
    }

    #[test]
    fn test_open_space_is_clear() {
        assert!(OpenSpace.can_move_between(Vec3::ZERO, Vec3::X * 100.0, &Probe::default()));
    }

    #[test]
    fn test_sphere_blocks_segment() {
        let mut world = SphereObstacles::new();
        world.add(Vec3::new(5.0, 0.0, 0.0), 1.0, LayerMask::STATIC);
        let probe = Probe::new(0.5, LayerMask::ALL);

        let hit = world.cast(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), &probe);
        assert!((hit.unwrap() - 3.5).abs() < 0.01);

        // Passes beside the sphere
        assert!(world.can_move_between(
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(10.0, 0.0, 3.0),
            &probe
        ));

        // Filtered out by the layer mask
        let other_layer = Probe::new(0.5, LayerMask(2));
        assert!(world.can_move_between(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), &other_layer));
    }
}
