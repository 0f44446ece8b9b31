//! Light accumulation for instance baking.
//!
//! Every static light in range of a point contributes unless world geometry
//! blocks the line between the light and the point.

use glam::Vec3;

use crate::core::config::OctreeConfig;
use crate::math::{Aabb, Ray};
use crate::mesh::MeshData;
use crate::spatial::{FaceIndex, LightId, LightIndex, Octree};

use super::color::{luminance, srgb8_to_linear};

/// Hits closer than this fraction of the light distance block the light
pub const DEFAULT_OCCLUSION_FACTOR: f32 = 0.85;

/// A point light of the level
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticLight {
    pub position: Vec3,
    /// Linear RGB
    pub color: Vec3,
    pub range: f32,
    /// Only static lights are baked
    pub is_static: bool,
}

impl StaticLight {
    /// Light with an 8-bit display (sRGB) color.
    pub fn from_srgb8(position: Vec3, color: [u8; 3], range: f32, is_static: bool) -> Self {
        Self {
            position,
            color: srgb8_to_linear(color),
            range,
            is_static,
        }
    }
}

/// Result of a light lookup
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BakedLight {
    /// Accumulated linear color
    pub color: Vec3,
    /// Unit vector from the point towards the strongest light
    pub dir_inverted: Vec3,
}

/// Index static lights by their range box widened by `tolerance`.
pub fn build_light_index(lights: &[StaticLight], tolerance: f32, config: &OctreeConfig) -> LightIndex {
    let mut entries = Vec::with_capacity(lights.len());
    for (i, light) in lights.iter().enumerate() {
        if !light.is_static {
            log::debug!("Skipping dynamic light {} at {:?}", i, light.position);
            continue;
        }
        let half = Vec3::splat(light.range + tolerance);
        entries.push((LightId(i as u32), Aabb::from_center_half_extent(light.position, half)));
    }
    Octree::build(entries, config)
}

/// Everything a light lookup reads, borrowed from the level session.
pub struct StaticLightResolver<'a> {
    pub lights: &'a [StaticLight],
    pub light_index: &'a LightIndex,
    pub mesh: &'a MeshData,
    pub face_index: &'a FaceIndex,
    /// Half-extent of the query box around a point
    pub tolerance: f32,
    pub occlusion_factor: f32,
}

impl StaticLightResolver<'_> {
    /// Accumulated light at `point`, `None` if no light reaches it.
    pub fn light_at(&self, point: Vec3) -> Option<BakedLight> {
        let query = Aabb::from_center_half_extent(point, Vec3::splat(self.tolerance));

        let mut color = Vec3::ZERO;
        let mut contributions = 0;
        let mut strongest: Option<(f32, Vec3)> = None;

        for LightId(id) in self.light_index.range_search(&query, false) {
            let Some(light) = self.lights.get(id as usize) else {
                continue;
            };
            let distance = light.position.distance(point);
            if distance >= light.range || self.is_occluded(light.position, point, distance) {
                continue;
            }

            let weight = 1.0 - distance / light.range;
            color += light.color * weight;
            contributions += 1;

            let score = weight * luminance(light.color);
            if strongest.is_none_or(|(best, _)| score > best) {
                let dir = (light.position - point).try_normalize().unwrap_or(Vec3::Y);
                strongest = Some((score, dir));
            }
        }

        if contributions == 0 {
            return None;
        }
        Some(BakedLight {
            color,
            dir_inverted: strongest.map_or(Vec3::Y, |(_, dir)| dir),
        })
    }

    /// Cast from the light towards the point through the world faces.
    fn is_occluded(&self, light_pos: Vec3, point: Vec3, distance: f32) -> bool {
        let Some((ray, _)) = Ray::between(light_pos, point) else {
            return false;
        };
        let limit = distance * self.occlusion_factor;
        self.face_index.segment_search(light_pos, point).into_iter().any(|key| {
            self.mesh.face(key).is_some_and(|face| {
                let [a, b, c] = face.positions;
                ray.intersects_triangle(a, b, c).is_some_and(|t| t < limit)
            })
        })
    }
}

/// Light at `point` using the default occlusion factor.
pub fn light_at(
    point: Vec3,
    lights: &[StaticLight],
    light_index: &LightIndex,
    mesh: &MeshData,
    face_index: &FaceIndex,
    tolerance: f32,
) -> Option<BakedLight> {
    StaticLightResolver {
        lights,
        light_index,
        mesh,
        face_index,
        tolerance,
        occlusion_factor: DEFAULT_OCCLUSION_FACTOR,
    }
    .light_at(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::ground::build_face_index;
    use crate::mesh::{MaterialId, VertexAttributes, VertexData, VertexPos};

    fn vertex(p: Vec3) -> (VertexPos, VertexAttributes) {
        (VertexPos::new(p), VertexAttributes::default())
    }

    /// Square wall in the plane x = `x`, spanning y and z in -5..5
    fn wall_at(x: f32) -> MeshData {
        let mut data = VertexData::new();
        data.push_triangle([
            vertex(Vec3::new(x, -5.0, -5.0)),
            vertex(Vec3::new(x, 5.0, -5.0)),
            vertex(Vec3::new(x, -5.0, 5.0)),
        ]);
        data.push_triangle([
            vertex(Vec3::new(x, 5.0, -5.0)),
            vertex(Vec3::new(x, 5.0, 5.0)),
            vertex(Vec3::new(x, -5.0, 5.0)),
        ]);
        let mut mesh = MeshData::new();
        mesh.submeshes.insert(MaterialId(0), data);
        mesh
    }

    fn resolve(point: Vec3, lights: &[StaticLight], mesh: &MeshData) -> Option<BakedLight> {
        let config = OctreeConfig::default();
        let light_index = build_light_index(lights, 1.0, &config);
        let face_index = build_face_index(mesh, &config);
        light_at(point, lights, &light_index, mesh, &face_index, 1.0)
    }

    #[test]
    fn test_single_light_weight() {
        let lights = [StaticLight::from_srgb8(Vec3::new(5.0, 0.0, 0.0), [255, 255, 255], 10.0, true)];
        let baked = resolve(Vec3::ZERO, &lights, &MeshData::new()).unwrap();
        assert!((baked.color - Vec3::splat(0.5)).length() < 1e-5);
        assert!((baked.dir_inverted - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_out_of_range_light() {
        let lights = [StaticLight::from_srgb8(Vec3::new(20.0, 0.0, 0.0), [255, 255, 255], 10.0, true)];
        assert!(resolve(Vec3::ZERO, &lights, &MeshData::new()).is_none());
    }

    #[test]
    fn test_dynamic_lights_are_ignored() {
        let lights = [StaticLight::from_srgb8(Vec3::new(1.0, 0.0, 0.0), [255, 255, 255], 10.0, false)];
        assert!(resolve(Vec3::ZERO, &lights, &MeshData::new()).is_none());
    }

    #[test]
    fn test_wall_occludes_only_light() {
        let lights = [StaticLight::from_srgb8(Vec3::new(10.0, 0.0, 0.0), [255, 255, 255], 100.0, true)];
        // Hit at 5 of 10 units from the light
        assert!(resolve(Vec3::ZERO, &lights, &wall_at(5.0)).is_none());
    }

    #[test]
    fn test_wall_near_point_does_not_occlude() {
        let lights = [StaticLight::from_srgb8(Vec3::new(10.0, 0.0, 0.0), [255, 255, 255], 100.0, true)];
        // Hit at 9.5 of 10 units, past the occlusion limit
        assert!(resolve(Vec3::ZERO, &lights, &wall_at(0.5)).is_some());
    }

    #[test]
    fn test_three_lights_pick_strongest_direction() {
        let lights = [
            // weight 0.5, luma 1.0
            StaticLight::from_srgb8(Vec3::new(5.0, 0.0, 0.0), [255, 255, 255], 10.0, true),
            // weight 0.6, luma 0.299
            StaticLight::from_srgb8(Vec3::new(0.0, 0.0, 8.0), [255, 0, 0], 20.0, true),
            // weight 0.8, luma 0.587
            StaticLight::from_srgb8(Vec3::new(-6.0, 0.0, 0.0), [0, 255, 0], 30.0, true),
        ];
        let baked = resolve(Vec3::ZERO, &lights, &MeshData::new()).unwrap();

        assert!((baked.dir_inverted - Vec3::X).length() < 1e-5);
        let expected = Vec3::splat(0.5) + Vec3::new(0.6, 0.0, 0.0) + Vec3::new(0.0, 0.8, 0.0);
        assert!((baked.color - expected).length() < 1e-4);
    }

    #[test]
    fn test_occluded_light_does_not_steer_direction() {
        let lights = [
            StaticLight::from_srgb8(Vec3::new(10.0, 0.0, 0.0), [255, 255, 255], 100.0, true),
            StaticLight::from_srgb8(Vec3::new(0.0, 0.0, -10.0), [51, 51, 51], 100.0, true),
        ];
        let baked = resolve(Vec3::ZERO, &lights, &wall_at(5.0)).unwrap();
        assert!((baked.dir_inverted - Vec3::NEG_Z).length() < 1e-5);
    }
}
