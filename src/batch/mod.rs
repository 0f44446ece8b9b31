//! GPU-ready draw batches.
//!
//! Geometry of many materials is merged into batches that share one texture
//! array. Each batch is annotated with per-cell clusters so draws can skip
//! culled grid cells.

pub mod batcher;
pub mod draw;
pub mod texture;

pub use batcher::{BatchOptions, build_batches};
pub use draw::{
    DetailLevel, DrawRange, DrawStrategy, MIN_CLUSTERED_COUNT, VertexStreams, draw_ranges,
    merge_visible_ranges,
};
pub use texture::{
    ImageTextureSource, MemoryTextureSource, PixelFormat, TextureArray, TextureCache, TextureData,
    TextureLayout, TextureSource,
};

use std::collections::HashSet;
use std::sync::Arc;

use crate::grid::{ChunkIndex, GridPos};
use crate::mesh::{BlendMode, VertexAttributes, VertexPos};

/// What a batch holds, which decides how it is drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchKind {
    /// Indexed world mesh, culled per cell
    World,
    /// Unindexed static instances, culled per cell
    Instance,
}

/// Start of one (cell, material) group in a batch's draw space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub cell: GridPos,
    pub chunk: ChunkIndex,
    /// Index buffer offset if indexed, vertex offset otherwise
    pub start: u32,
}

/// One physical batch: buffers, texture array and clusters.
pub struct Batch {
    pub kind: BatchKind,
    pub blend: BlendMode,
    pub positions: Vec<VertexPos>,
    pub attributes: Vec<VertexAttributes>,
    /// Texture array layer per vertex
    pub texture_layers: Vec<u32>,
    /// Full detail indices followed by reduced detail indices
    pub indices: Vec<u32>,
    pub textures: Arc<TextureArray>,
    pub clusters: Vec<Cluster>,
    pub lod_clusters: Vec<Cluster>,
    /// First index of the reduced detail region
    pub lod_index_start: u32,
    strategy: Box<dyn DrawStrategy>,
}

impl Batch {
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Full detail index count
    pub fn index_count(&self) -> u32 {
        if self.is_indexed() { self.lod_index_start } else { 0 }
    }

    /// Reduced detail index count
    pub fn lod_index_count(&self) -> u32 {
        self.indices.len() as u32 - self.index_count()
    }

    /// Elements a full detail draw covers
    pub fn draw_count(&self) -> u32 {
        if self.is_indexed() { self.index_count() } else { self.vertex_count() }
    }

    /// Distinct grid cells in this batch
    pub fn chunk_count(&self) -> usize {
        self.clusters.iter().map(|c| c.cell).collect::<HashSet<_>>().len()
    }

    pub fn strategy(&self) -> &dyn DrawStrategy {
        self.strategy.as_ref()
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("kind", &self.kind)
            .field("blend", &self.blend)
            .field("vertices", &self.vertex_count())
            .field("indices", &self.index_count())
            .field("lod_indices", &self.lod_index_count())
            .field("textures", &self.textures.len())
            .field("clusters", &self.clusters.len())
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
