//! Vertex stream layouts shared with the GPU.
//!
//! Positions and attributes live in separate streams so depth-only passes can
//! bind positions alone.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Lightmap index stored for geometry without a lightmap.
pub const NO_LIGHTMAP: i32 = -1;

/// Position stream element (12 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VertexPos {
    pub position: [f32; 3],
}

impl VertexPos {
    pub fn new(position: Vec3) -> Self {
        Self { position: position.to_array() }
    }

    pub fn vec3(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// Attribute stream element (64 bytes, must match the shader input layout)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VertexAttributes {
    /// Surface normal (12 bytes, offset 0)
    pub normal: [f32; 3],
    /// Base color texture coordinates (8 bytes, offset 12)
    pub uv: [f32; 2],
    /// Lightmap coordinates, z holds the lightmap index or -1 (12 bytes, offset 20)
    pub lightmap_uv: [f32; 3],
    /// Baked static light color, linear RGBA (16 bytes, offset 32)
    pub light_color: [f32; 4],
    /// Direction towards the dominant static light (12 bytes, offset 48)
    pub light_dir_inverted: [f32; 3],
    /// 1.0 when the vertex receives sky light, 0.0 otherwise (4 bytes, offset 60)
    pub sun_visibility: f32,
}

impl VertexAttributes {
    /// Lightmap index, `NO_LIGHTMAP` if unlit by a lightmap
    pub fn lightmap_index(&self) -> i32 {
        self.lightmap_uv[2] as i32
    }

    pub fn has_lightmap(&self) -> bool {
        self.lightmap_index() >= 0
    }
}
