//! Horizontal world grid used to bucket geometry and cull it per cell.
//!
//! The grid covers the X/Z footprint of the level. World Z maps to grid `y`.

pub mod chunk_grid;

pub use chunk_grid::{CellState, ChunkGrid, VisibilityFilter};

use std::cmp::Ordering;

use glam::Vec3;

/// Integer coordinate of a grid cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell containing a world position (floor division of X and Z)
    pub fn from_world(pos: Vec3, cell_size: f32) -> Self {
        Self {
            x: (pos.x / cell_size).floor() as i32,
            y: (pos.z / cell_size).floor() as i32,
        }
    }
}

/// Rows first, so sorted cells walk the grid row by row and neighbours in a
/// row end up adjacent in the buffers.
impl Ord for GridPos {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for GridPos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dense index of a cell inside one `ChunkGrid`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkIndex(pub u32);
