//! Spatial indexing over axis-aligned boxes.
//!
//! One octree indexes world faces, a second one static lights. Both are built
//! once per level and never modified afterwards.

pub mod octree;

pub use octree::Octree;

use crate::mesh::FaceKey;

/// Index of a static light in the session's light list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u32);

/// Octree over world mesh faces
pub type FaceIndex = Octree<FaceKey>;

/// Octree over static lights
pub type LightIndex = Octree<LightId>;
