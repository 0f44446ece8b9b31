//! Mesh model: vertex streams, materials and per-material geometry.

pub mod data;
pub mod material;
pub mod optimizer;
pub mod vertex;

pub use data::{ChunkedVertexData, FaceKey, FaceRef, MeshData, VertexData};
pub use material::{BlendMode, Material, MaterialId, MaterialTable};
pub use optimizer::{MeshOptimizer, PassthroughOptimizer};
pub use vertex::{NO_LIGHTMAP, VertexAttributes, VertexPos};
