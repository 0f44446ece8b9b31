//! Hook for an external vertex-cache optimizer and simplifier.

use super::data::VertexData;

/// Index/vertex cache optimization and LOD generation.
///
/// Implementations may reorder vertices and rewrite indices but must keep the
/// position and attribute streams aligned.
pub trait MeshOptimizer: Send + Sync {
    /// Optimize `data` in place. Non-indexed data may become indexed.
    fn optimize(&self, data: &mut VertexData);

    /// Reduced detail index list for `data`. Empty means no LOD.
    fn simplify(&self, data: &VertexData) -> Vec<u32>;
}

/// Leaves geometry as is and produces no LOD.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughOptimizer;

impl MeshOptimizer for PassthroughOptimizer {
    fn optimize(&self, _data: &mut VertexData) {}

    fn simplify(&self, _data: &VertexData) -> Vec<u32> {
        Vec::new()
    }
}

/// Run the optimizer on `data` and, if requested, store its LOD indices.
pub fn apply(optimizer: &dyn MeshOptimizer, data: &mut VertexData, generate_lod: bool) {
    optimizer.optimize(data);
    if generate_lod {
        data.lod_indices = optimizer.simplify(data);
    }
}
