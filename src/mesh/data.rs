//! CPU-side vertex containers.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::core::error::DataError;
use crate::core::types::Result;
use crate::grid::GridPos;
use crate::math::Aabb;

use super::material::MaterialId;
use super::vertex::{VertexAttributes, VertexPos};

/// Parallel position/attribute streams with optional index lists.
///
/// Positions and attributes can only be pushed together, so both streams
/// always have the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexData {
    positions: Vec<VertexPos>,
    attributes: Vec<VertexAttributes>,
    /// Full detail triangle list, empty for non-indexed data
    pub indices: Vec<u32>,
    /// Reduced detail triangle list, empty when no LOD was generated
    pub lod_indices: Vec<u32>,
}

impl VertexData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from separate streams, rejecting mismatched lengths and
    /// out-of-range indices.
    pub fn from_parts(
        positions: Vec<VertexPos>,
        attributes: Vec<VertexAttributes>,
        indices: Vec<u32>,
    ) -> Result<Self> {
        let data = Self { positions, attributes, indices, lod_indices: Vec::new() };
        data.validate()?;
        Ok(data)
    }

    /// Append a vertex and return its index.
    pub fn push(&mut self, position: VertexPos, attributes: VertexAttributes) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.attributes.push(attributes);
        index
    }

    /// Append three unindexed vertices.
    pub fn push_triangle(&mut self, vertices: [(VertexPos, VertexAttributes); 3]) {
        for (pos, attr) in vertices {
            self.push(pos, attr);
        }
    }

    /// Append all of `other`, rebasing its indices.
    ///
    /// If only one side is indexed, the unindexed side gets sequential
    /// indices first. Likewise a side without LOD contributes its full
    /// indices to the LOD list when the other side has one.
    pub fn append(&mut self, other: &VertexData) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }

        let indexed = self.is_indexed() || other.is_indexed();
        let lod = !self.lod_indices.is_empty() || !other.lod_indices.is_empty();
        if lod && self.lod_indices.is_empty() {
            self.lod_indices = self.full_indices();
        }
        if indexed && !self.is_indexed() {
            self.indices = self.full_indices();
        }

        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.attributes.extend_from_slice(&other.attributes);
        if indexed {
            self.indices.extend(other.full_indices().into_iter().map(|i| i + base));
        }
        if lod {
            let other_lod = if other.lod_indices.is_empty() { other.full_indices() } else { other.lod_indices.clone() };
            self.lod_indices.extend(other_lod.into_iter().map(|i| i + base));
        }
    }

    /// Full detail triangle list, sequential for unindexed data
    pub fn full_indices(&self) -> Vec<u32> {
        if self.is_indexed() {
            self.indices.clone()
        } else {
            (0..self.positions.len() as u32).collect()
        }
    }

    pub fn positions(&self) -> &[VertexPos] {
        &self.positions
    }

    pub fn attributes(&self) -> &[VertexAttributes] {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut [VertexAttributes] {
        &mut self.attributes
    }

    /// Mutable access to both streams at once. Lengths cannot change.
    pub fn streams_mut(&mut self) -> (&mut [VertexPos], &mut [VertexAttributes]) {
        (&mut self.positions, &mut self.attributes)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Elements a full detail draw covers: indices if indexed, else vertices
    pub fn draw_count(&self) -> usize {
        if self.is_indexed() { self.indices.len() } else { self.positions.len() }
    }

    pub fn triangle_count(&self) -> usize {
        self.draw_count() / 3
    }

    /// Vertex ids of triangle `i` in draw order
    pub fn triangle(&self, i: usize) -> Option<[u32; 3]> {
        let start = i * 3;
        if self.is_indexed() {
            let tri = self.indices.get(start..start + 3)?;
            Some([tri[0], tri[1], tri[2]])
        } else if start + 3 <= self.positions.len() {
            let s = start as u32;
            Some([s, s + 1, s + 2])
        } else {
            None
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().map(VertexPos::vec3))
    }

    /// Index lists reference existing vertices and streams are aligned.
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() != self.attributes.len() {
            return Err(DataError::MisalignedVertices {
                positions: self.positions.len(),
                attributes: self.attributes.len(),
            }
            .into());
        }
        let vertex_count = self.positions.len();
        if let Some(&index) = self
            .indices
            .iter()
            .chain(self.lod_indices.iter())
            .find(|&&i| i as usize >= vertex_count)
        {
            return Err(DataError::InvalidIndex { index, vertex_count }.into());
        }
        Ok(())
    }
}

/// Per grid cell vertex data of one material
#[derive(Clone, Debug, Default)]
pub struct ChunkedVertexData {
    pub chunks: BTreeMap<GridPos, VertexData>,
}

impl ChunkedVertexData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data of the chunk at `pos`, created on first use
    pub fn chunk_mut(&mut self, pos: GridPos) -> &mut VertexData {
        self.chunks.entry(pos).or_default()
    }

    pub fn vertex_count(&self) -> usize {
        self.chunks.values().map(VertexData::vertex_count).sum()
    }

    pub fn draw_count(&self) -> usize {
        self.chunks.values().map(VertexData::draw_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.values().all(VertexData::is_empty)
    }
}

/// Identifies one triangle of a `MeshData`.
///
/// `vertex_start` is the first of the triangle's three draw-order slots: an
/// index buffer offset for indexed data, a vertex offset otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceKey {
    pub material: MaterialId,
    pub vertex_start: u32,
}

/// Resolved face geometry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRef {
    pub positions: [Vec3; 3],
    /// Lightmap index of the first vertex
    pub lightmap_index: i32,
}

impl FaceRef {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions)
    }

    pub fn has_lightmap(&self) -> bool {
        self.lightmap_index >= 0
    }
}

/// World geometry by material. Immutable once its face index is built.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub submeshes: BTreeMap<MaterialId, VertexData>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.submeshes.values().map(VertexData::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.submeshes.values().map(VertexData::triangle_count).sum()
    }

    pub fn bounds(&self) -> Aabb {
        self.submeshes
            .values()
            .fold(Aabb::EMPTY, |acc, data| acc.merged(&data.bounds()))
    }

    /// Resolve a face key, `None` if it does not name a triangle.
    pub fn face(&self, key: FaceKey) -> Option<FaceRef> {
        let data = self.submeshes.get(&key.material)?;
        if key.vertex_start % 3 != 0 {
            return None;
        }
        let ids = data.triangle(key.vertex_start as usize / 3)?;
        let positions = data.positions();
        let attributes = data.attributes();
        let first = attributes.get(ids[0] as usize)?;
        Some(FaceRef {
            positions: [
                positions.get(ids[0] as usize)?.vec3(),
                positions.get(ids[1] as usize)?.vec3(),
                positions.get(ids[2] as usize)?.vec3(),
            ],
            lightmap_index: first.lightmap_index(),
        })
    }

    /// Every face with its key, in material then draw order
    pub fn faces(&self) -> impl Iterator<Item = (FaceKey, FaceRef)> + '_ {
        self.submeshes.iter().flat_map(move |(&material, data)| {
            (0..data.triangle_count()).filter_map(move |t| {
                let key = FaceKey { material, vertex_start: (t * 3) as u32 };
                self.face(key).map(|face| (key, face))
            })
        })
    }
}
