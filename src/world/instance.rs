//! Placed static objects with their baked lighting.

use glam::{Mat4, Vec3};

use crate::grid::{ChunkIndex, GridPos};
use crate::math::Aabb;

/// One placed object. Immutable once the level is loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticInstance {
    pub name: String,
    pub visual: String,
    pub transform: Mat4,
    /// World space bounds
    pub bbox: Aabb,
    /// Linear color of the static lights reaching the instance
    pub light_color: Vec3,
    /// Unit vector towards the strongest static light
    pub light_dir_inverted: Vec3,
    /// No lightmapped ground below, so the sky reaches it
    pub receives_sun: bool,
    pub cell: GridPos,
    pub chunk: ChunkIndex,
}

impl StaticInstance {
    /// Point used for ground and light lookups
    pub fn anchor(&self) -> Vec3 {
        self.bbox.center()
    }

    pub fn sun_visibility(&self) -> f32 {
        if self.receives_sun { 1.0 } else { 0.0 }
    }
}
