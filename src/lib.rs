//! Zenbake - static world preparation for a mesh-based renderer
//!
//! Turns a parsed level into draw-ready data: an octree over world faces,
//! baked static lighting for placed objects, texture-array batches with
//! per-cell clusters and a culling grid that yields draw ranges per frame.

pub mod core;
pub mod math;
pub mod mesh;
pub mod grid;
pub mod spatial;
pub mod lighting;
pub mod batch;
pub mod world;
pub mod gpu;

pub use crate::core::{BakeConfig, Camera, DataError, Error};
pub use crate::world::{FrameDrawList, LevelInput, LevelSession, LoadStats};
