//! Conversion of parsed meshes into vertex data and grid chunks.

use std::collections::BTreeMap;

use glam::{Mat3, Vec3};

use crate::core::error::DataError;
use crate::core::types::Result;
use crate::grid::{ChunkGrid, GridPos};
use crate::lighting::color::srgb_color_to_linear;
use crate::math::Aabb;
use crate::mesh::{
    ChunkedVertexData, MaterialId, MaterialTable, MeshData, MeshOptimizer, NO_LIGHTMAP, VertexAttributes,
    VertexData, VertexPos,
};

use super::input::{MeshAsset, SubMeshInput, VertexInput, WorldMeshInput};
use super::instance::StaticInstance;

/// Convert a corner into GPU streams. Unlit corners receive the sky.
fn convert_vertex(v: &VertexInput) -> (VertexPos, VertexAttributes) {
    let lightmap_index = if v.has_lightmap() { v.lightmap_index } else { NO_LIGHTMAP };
    let color = srgb_color_to_linear([v.color[0], v.color[1], v.color[2]]);
    let attributes = VertexAttributes {
        normal: v.normal,
        uv: v.uv,
        lightmap_uv: [v.lightmap_uv[0], v.lightmap_uv[1], lightmap_index as f32],
        light_color: [color.x, color.y, color.z, v.color[3].clamp(0.0, 1.0)],
        light_dir_inverted: [0.0, 1.0, 0.0],
        sun_visibility: if v.has_lightmap() { 0.0 } else { 1.0 },
    };
    (VertexPos::new(Vec3::from_array(v.position)), attributes)
}

fn append_submesh(data: &mut VertexData, submesh: &SubMeshInput) {
    for triangle in &submesh.triangles {
        data.push_triangle(triangle.each_ref().map(convert_vertex));
    }
}

/// Build the world mesh, interning its materials.
///
/// A lightmapped world requires lightmap data on every corner.
pub fn world_mesh_data(input: &WorldMeshInput, materials: &mut MaterialTable) -> Result<MeshData> {
    let mut mesh = MeshData::new();
    for (s, submesh) in input.submeshes.iter().enumerate() {
        if input.lightmapped {
            if let Some(t) = submesh
                .triangles
                .iter()
                .position(|tri| tri.iter().any(|v| !v.has_lightmap()))
            {
                return Err(DataError::MissingLightmap { submesh: s, triangle: t }.into());
            }
        }
        let id = materials.intern(submesh.material.to_material());
        append_submesh(mesh.submeshes.entry(id).or_default(), submesh);
    }
    Ok(mesh)
}

/// Object space geometry of one visual, by material.
pub type PreparedMesh = Vec<(MaterialId, VertexData)>;

/// Validate and convert an instance mesh, then run the optimizer once.
pub fn prepare_instance_mesh(
    visual: &str,
    asset: &MeshAsset,
    materials: &mut MaterialTable,
    optimizer: &dyn MeshOptimizer,
) -> Result<PreparedMesh> {
    let lightmapped = asset
        .submeshes
        .iter()
        .flat_map(|s| s.triangles.iter())
        .any(|tri| tri.iter().any(VertexInput::has_lightmap));
    if lightmapped {
        return Err(DataError::UnexpectedLightmap { visual: visual.to_string() }.into());
    }

    let mut by_material: BTreeMap<MaterialId, VertexData> = BTreeMap::new();
    for submesh in &asset.submeshes {
        let id = materials.intern(submesh.material.to_material());
        append_submesh(by_material.entry(id).or_default(), submesh);
    }
    let mut prepared: PreparedMesh = by_material.into_iter().collect();
    for (_, data) in &mut prepared {
        optimizer.optimize(data);
        data.validate()?;
    }
    Ok(prepared)
}

/// Place a prepared mesh in the world and apply the instance's baked light.
pub fn bake_instance(mesh: &PreparedMesh, instance: &StaticInstance) -> Vec<(MaterialId, VertexData)> {
    let transform = instance.transform;
    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
    let light_color = instance.light_color.extend(1.0).to_array();
    let light_dir = instance.light_dir_inverted.to_array();
    let sun = instance.sun_visibility();

    mesh.iter()
        .map(|(id, data)| {
            let mut placed = data.clone();
            let (positions, attributes) = placed.streams_mut();
            for (pos, attr) in positions.iter_mut().zip(attributes.iter_mut()) {
                *pos = VertexPos::new(transform.transform_point3(pos.vec3()));
                let n = normal_matrix * Vec3::from_array(attr.normal);
                attr.normal = n.try_normalize().unwrap_or(Vec3::Y).to_array();
                attr.light_color = light_color;
                attr.light_dir_inverted = light_dir;
                attr.sun_visibility = sun;
            }
            (*id, placed)
        })
        .collect()
}

/// Cell of a triangle: the one holding its centroid
fn triangle_cell(grid: &ChunkGrid, corners: [Vec3; 3]) -> GridPos {
    grid.cell_of((corners[0] + corners[1] + corners[2]) / 3.0)
}

/// Split the world mesh into per-cell chunks and register them in the grid.
///
/// Every chunk goes through the optimizer; chunks get reduced detail indices
/// when `generate_lod` is set.
pub fn chunk_world(
    mesh: &MeshData,
    grid: &mut ChunkGrid,
    optimizer: &dyn MeshOptimizer,
    generate_lod: bool,
) -> BTreeMap<MaterialId, ChunkedVertexData> {
    let mut out: BTreeMap<MaterialId, ChunkedVertexData> = BTreeMap::new();
    for (&id, data) in &mesh.submeshes {
        let chunked = out.entry(id).or_default();
        for t in 0..data.triangle_count() {
            let Some(ids) = data.triangle(t) else {
                continue;
            };
            let corners = ids.map(|i| (data.positions()[i as usize], data.attributes()[i as usize]));
            let points = corners.map(|(p, _)| p.vec3());
            let cell = triangle_cell(grid, points);
            grid.include(cell, &Aabb::from_points(points));
            chunked.chunk_mut(cell).push_triangle(corners);
        }
        for chunk in chunked.chunks.values_mut() {
            crate::mesh::optimizer::apply(optimizer, chunk, generate_lod);
        }
    }
    out
}

/// Add a baked instance to the chunk of its cell and register its bounds.
pub fn chunk_instance(
    baked: Vec<(MaterialId, VertexData)>,
    instance: &StaticInstance,
    grid: &mut ChunkGrid,
    out: &mut BTreeMap<MaterialId, ChunkedVertexData>,
) {
    grid.include(instance.cell, &instance.bbox);
    for (id, data) in baked {
        out.entry(id).or_default().chunk_mut(instance.cell).append(&data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::grid::ChunkIndex;
    use crate::mesh::PassthroughOptimizer;
    use crate::world::input::MaterialDesc;
    use glam::Mat4;

    fn corner(x: f32, z: f32, lightmap_index: i32) -> VertexInput {
        VertexInput {
            position: [x, 0.0, z],
            normal: [0.0, 1.0, 0.0],
            uv: [0.0, 0.0],
            lightmap_uv: [0.5, 0.5],
            lightmap_index,
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    fn submesh(texture: &str, triangles: Vec<[VertexInput; 3]>) -> SubMeshInput {
        SubMeshInput {
            material: MaterialDesc { texture: texture.into(), blend: Default::default(), srgb: true },
            triangles,
        }
    }

    fn tri_at(x: f32, z: f32, lightmap_index: i32) -> [VertexInput; 3] {
        [
            corner(x, z, lightmap_index),
            corner(x + 1.0, z, lightmap_index),
            corner(x, z + 1.0, lightmap_index),
        ]
    }

    #[test]
    fn test_missing_lightmap_is_fatal() {
        let mut bad = tri_at(0.0, 0.0, 0);
        bad[1].lightmap_index = -1;
        let input = WorldMeshInput {
            lightmapped: true,
            submeshes: vec![
                submesh("a", vec![tri_at(0.0, 0.0, 1)]),
                submesh("b", vec![tri_at(0.0, 0.0, 1), bad]),
            ],
        };
        let err = world_mesh_data(&input, &mut MaterialTable::new()).unwrap_err();
        assert!(matches!(err, Error::Data(DataError::MissingLightmap { submesh: 1, triangle: 1 })));
    }

    #[test]
    fn test_unlightmapped_world_accepts_unlit() {
        let input = WorldMeshInput {
            lightmapped: false,
            submeshes: vec![submesh("a", vec![tri_at(0.0, 0.0, -1)]), submesh("A", vec![tri_at(5.0, 0.0, 2)])],
        };
        let mut materials = MaterialTable::new();
        let mesh = world_mesh_data(&input, &mut materials).unwrap();
        // Same texture and blend share one material
        assert_eq!(materials.len(), 1);
        assert_eq!(mesh.triangle_count(), 2);

        let data = &mesh.submeshes[&MaterialId(0)];
        assert_eq!(data.attributes()[0].sun_visibility, 1.0);
        assert_eq!(data.attributes()[3].sun_visibility, 0.0);
        assert_eq!(data.attributes()[3].lightmap_index(), 2);
    }

    #[test]
    fn test_instance_lightmap_is_fatal() {
        let asset = MeshAsset { submeshes: vec![submesh("chair", vec![tri_at(0.0, 0.0, 0)])] };
        let err = prepare_instance_mesh("CHAIR.3DS", &asset, &mut MaterialTable::new(), &PassthroughOptimizer)
            .unwrap_err();
        match err {
            Error::Data(DataError::UnexpectedLightmap { visual }) => assert_eq!(visual, "CHAIR.3DS"),
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_bake_instance_transforms_and_lights() {
        let asset = MeshAsset { submeshes: vec![submesh("chair", vec![tri_at(0.0, 0.0, -1)])] };
        let mut materials = MaterialTable::new();
        let prepared = prepare_instance_mesh("CHAIR", &asset, &mut materials, &PassthroughOptimizer).unwrap();

        let transform = Mat4::from_translation(Vec3::new(10.0, 2.0, 0.0)) * Mat4::from_rotation_x(std::f32::consts::PI);
        let instance = StaticInstance {
            name: "chair".into(),
            visual: "CHAIR".into(),
            transform,
            bbox: Aabb::new(Vec3::ZERO, Vec3::ONE),
            light_color: Vec3::new(0.5, 0.25, 0.0),
            light_dir_inverted: Vec3::X,
            receives_sun: false,
            cell: GridPos::new(0, 0),
            chunk: ChunkIndex(0),
        };
        let baked = bake_instance(&prepared, &instance);
        let data = &baked[0].1;

        assert!((data.positions()[1].vec3() - Vec3::new(11.0, 2.0, 0.0)).length() < 1e-5);
        // Flipped upside down
        assert!((Vec3::from_array(data.attributes()[0].normal) - Vec3::NEG_Y).length() < 1e-5);
        assert_eq!(data.attributes()[0].light_color, [0.5, 0.25, 0.0, 1.0]);
        assert_eq!(data.attributes()[0].light_dir_inverted, [1.0, 0.0, 0.0]);
        assert_eq!(data.attributes()[0].sun_visibility, 0.0);
    }

    #[test]
    fn test_chunk_world_by_centroid() {
        let input = WorldMeshInput {
            lightmapped: false,
            submeshes: vec![submesh("a", vec![tri_at(1.0, 1.0, -1), tri_at(15.0, 1.0, -1), tri_at(9.5, 25.0, -1)])],
        };
        let mut materials = MaterialTable::new();
        let mesh = world_mesh_data(&input, &mut materials).unwrap();
        let mut grid = ChunkGrid::new(&mesh.bounds(), 10.0, None).unwrap();

        let chunked = chunk_world(&mesh, &mut grid, &PassthroughOptimizer, false);
        let cells: Vec<GridPos> = chunked[&MaterialId(0)].chunks.keys().copied().collect();
        // Centroid of the third triangle lies at x = 9.83
        assert_eq!(cells, vec![GridPos::new(0, 0), GridPos::new(1, 0), GridPos::new(0, 2)]);
        assert_eq!(grid.cells_in_use(), 3);
        assert_eq!(chunked[&MaterialId(0)].vertex_count(), 9);
    }
}
