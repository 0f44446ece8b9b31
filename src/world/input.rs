//! Parsed level description.
//!
//! These types mirror what the asset parser hands over. They deserialize from
//! JSON so dumped levels can be replayed by the command line tool.

use std::collections::BTreeMap;
use std::path::Path;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::types::Result;
use crate::math::Aabb;
use crate::mesh::{BlendMode, Material, NO_LIGHTMAP};

/// Whole level as produced by the parser
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelInput {
    pub world: WorldMeshInput,
    /// Instance meshes by visual name
    pub meshes: BTreeMap<String, MeshAsset>,
    /// Roots of the VOB tree
    pub vobs: Vec<VobNode>,
    pub lights: Vec<LightInput>,
}

impl LevelInput {
    /// Read a level description from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let level = serde_json::from_str(&text)?;
        log::debug!("Read level description {}", path.as_ref().display());
        Ok(level)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}

/// Material as named by the source data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialDesc {
    pub texture: String,
    #[serde(default)]
    pub blend: BlendMode,
    #[serde(default = "default_true")]
    pub srgb: bool,
}

fn default_true() -> bool {
    true
}

impl MaterialDesc {
    pub fn to_material(&self) -> Material {
        let mut material = Material::new(&self.texture, self.blend);
        material.srgb = self.srgb;
        material
    }
}

fn default_lightmap_index() -> i32 {
    NO_LIGHTMAP
}

fn default_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

/// One triangle corner
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VertexInput {
    pub position: [f32; 3],
    #[serde(default)]
    pub normal: [f32; 3],
    #[serde(default)]
    pub uv: [f32; 2],
    #[serde(default)]
    pub lightmap_uv: [f32; 2],
    /// Lightmap page, -1 if unlit
    #[serde(default = "default_lightmap_index")]
    pub lightmap_index: i32,
    /// Vertex color, sRGB with channels in 0..1
    #[serde(default = "default_color")]
    pub color: [f32; 4],
}

impl VertexInput {
    pub fn has_lightmap(&self) -> bool {
        self.lightmap_index >= 0
    }
}

/// Triangles sharing one material
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubMeshInput {
    pub material: MaterialDesc,
    pub triangles: Vec<[VertexInput; 3]>,
}

/// The level's static world mesh
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldMeshInput {
    /// Every triangle must carry lightmap data
    pub lightmapped: bool,
    pub submeshes: Vec<SubMeshInput>,
}

/// Mesh referenced by placed objects, in object space
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshAsset {
    pub submeshes: Vec<SubMeshInput>,
}

/// Bounding box as two corners
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AabbInput {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl From<AabbInput> for Aabb {
    fn from(b: AabbInput) -> Self {
        Aabb::new(Vec3::from_array(b.min), Vec3::from_array(b.max))
    }
}

fn identity() -> [[f32; 4]; 4] {
    Mat4::IDENTITY.to_cols_array_2d()
}

/// Node of the placed-object tree
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VobNode {
    #[serde(default)]
    pub name: String,
    /// Mesh asset drawn at this node
    #[serde(default)]
    pub visual: Option<String>,
    /// World transform, column-major
    #[serde(default = "identity")]
    pub transform: [[f32; 4]; 4],
    /// World space bounds
    pub bbox: AabbInput,
    #[serde(default)]
    pub children: Vec<VobNode>,
}

impl VobNode {
    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.transform)
    }
}

/// Point light as placed in the level
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightInput {
    pub position: [f32; 3],
    /// 8-bit sRGB
    pub color: [u8; 3],
    pub range: f32,
    #[serde(default = "default_true")]
    pub is_static: bool,
}
