//! Face directly below a point.

use glam::Vec3;

use crate::core::config::OctreeConfig;
use crate::math::triangle::{average_height, contains_xz};
use crate::mesh::{FaceKey, MeshData};
use crate::spatial::{FaceIndex, Octree};

/// Index every face of `mesh` by its bounding box.
pub fn build_face_index(mesh: &MeshData, config: &OctreeConfig) -> FaceIndex {
    let faces: Vec<(FaceKey, _)> = mesh.faces().map(|(key, face)| (key, face.bounds())).collect();
    log::debug!("Indexing {} world faces", faces.len());
    Octree::build(faces, config)
}

/// Face whose X/Z footprint contains `point`, searching at most
/// `max_distance` downward.
///
/// Among containing faces the one whose average height is closest to the
/// point wins, which may be slightly above it for sloped faces. Ties go to
/// the smaller key.
pub fn ground_face_at(point: Vec3, mesh: &MeshData, index: &FaceIndex, max_distance: f32) -> Option<FaceKey> {
    let bottom = point - Vec3::Y * max_distance;

    let mut best: Option<(f32, FaceKey)> = None;
    for key in index.segment_search(point, bottom) {
        let Some(face) = mesh.face(key) else {
            continue;
        };
        let [a, b, c] = face.positions;
        if !contains_xz(point, a, b, c) {
            continue;
        }
        let diff = (average_height(a, b, c) - point.y).abs();
        let closer = match best {
            None => true,
            Some((best_diff, best_key)) => diff < best_diff || (diff == best_diff && key < best_key),
        };
        if closer {
            best = Some((diff, key));
        }
    }
    best.map(|(_, key)| key)
}
