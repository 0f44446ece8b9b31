//! Everything that lives for one loaded level.
//!
//! `LevelSession::load` runs the whole preparation pipeline synchronously:
//! world mesh and face index, static lights, instance baking, grid chunking
//! and batching. Dropping the session releases all of it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use glam::Vec3;

use crate::batch::{
    Batch, BatchKind, BatchOptions, DetailLevel, DrawRange, TextureCache, TextureSource, build_batches,
    draw_ranges,
};
use crate::core::config::BakeConfig;
use crate::core::error::DataError;
use crate::core::types::Result;
use crate::core::Camera;
use crate::grid::{ChunkGrid, ChunkIndex, GridPos, VisibilityFilter};
use crate::lighting::{
    BakedLight, StaticLight, StaticLightResolver, build_face_index, build_light_index, ground_face_at,
};
use crate::math::Aabb;
use crate::mesh::{ChunkedVertexData, FaceKey, MaterialId, MaterialTable, MeshData, MeshOptimizer};
use crate::spatial::{FaceIndex, LightIndex};

use super::geometry::{self, PreparedMesh};
use super::input::LevelInput;
use super::instance::StaticInstance;
use super::vob;

/// Counters gathered during `load`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadStats {
    pub world_triangles: usize,
    pub materials: usize,
    pub lights: usize,
    pub static_lights: usize,
    pub instances: usize,
    /// Placed visuals without a mesh asset
    pub skipped_instances: usize,
    pub lit_instances: usize,
    pub sunlit_instances: usize,
    pub cells_in_use: usize,
    pub world_batches: usize,
    pub instance_batches: usize,
    pub load_ms: f64,
}

/// Draw ranges of one batch for the current frame
#[derive(Clone, Debug, PartialEq)]
pub struct BatchDraw {
    pub kind: BatchKind,
    /// Index into the session's world or instance batches
    pub batch: usize,
    pub full: Vec<DrawRange>,
    pub reduced: Vec<DrawRange>,
}

/// Everything to submit for one frame
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameDrawList {
    pub draws: Vec<BatchDraw>,
    pub draw_calls: usize,
    pub batches_drawn: usize,
    pub batches_culled: usize,
}

impl FrameDrawList {
    fn push(&mut self, draw: BatchDraw) {
        let calls = draw.full.len() + draw.reduced.len();
        if calls == 0 {
            self.batches_culled += 1;
            return;
        }
        self.draw_calls += calls;
        self.batches_drawn += 1;
        self.draws.push(draw);
    }

    /// Elements covered by all ranges
    pub fn element_count(&self) -> u64 {
        self.draws
            .iter()
            .flat_map(|d| d.full.iter().chain(d.reduced.iter()))
            .map(|r| r.count() as u64)
            .sum()
    }
}

/// All per-level resources
pub struct LevelSession {
    config: BakeConfig,
    materials: MaterialTable,
    world_mesh: MeshData,
    face_index: FaceIndex,
    lights: Vec<StaticLight>,
    light_index: LightIndex,
    instances: Vec<StaticInstance>,
    grid: ChunkGrid,
    world_batches: Vec<Batch>,
    instance_batches: Vec<Batch>,
    textures: TextureCache,
    processed_visuals: HashSet<String>,
    stats: LoadStats,
}

impl LevelSession {
    /// Prepare a parsed level for drawing.
    ///
    /// Fails on malformed data or a texture that cannot be loaded. Placed
    /// visuals without a mesh asset are skipped with a warning.
    pub fn load(
        level: LevelInput,
        config: BakeConfig,
        texture_source: Box<dyn TextureSource>,
        optimizer: &dyn MeshOptimizer,
    ) -> Result<Self> {
        let start = Instant::now();
        config.validate()?;
        let mut stats = LoadStats::default();

        // World mesh and its face index
        let mut phase = Instant::now();
        let mut materials = MaterialTable::new();
        let world_mesh = geometry::world_mesh_data(&level.world, &mut materials)?;
        let face_index = build_face_index(&world_mesh, &config.octree);
        stats.world_triangles = world_mesh.triangle_count();
        log::info!(
            "World mesh: {} triangles, {} faces indexed in {:.1}ms",
            stats.world_triangles,
            face_index.len(),
            phase.elapsed().as_secs_f64() * 1000.0
        );

        // Static lights
        phase = Instant::now();
        let lights: Vec<StaticLight> = level
            .lights
            .iter()
            .map(|l| StaticLight::from_srgb8(Vec3::from_array(l.position), l.color, l.range, l.is_static))
            .collect();
        let light_index = build_light_index(&lights, config.lighting.light_tolerance, &config.octree);
        stats.lights = lights.len();
        stats.static_lights = light_index.len();
        log::info!(
            "Lights: {} static of {} in {:.1}ms",
            stats.static_lights,
            stats.lights,
            phase.elapsed().as_secs_f64() * 1000.0
        );

        // Instances: validate each visual once, bake lighting per placement
        phase = Instant::now();
        let mut processed_visuals = HashSet::new();
        let mut prepared: HashMap<String, PreparedMesh> = HashMap::new();
        let mut missing: HashSet<&str> = HashSet::new();
        let mut placed = Vec::new();
        {
            let resolver = StaticLightResolver {
                lights: &lights,
                light_index: &light_index,
                mesh: &world_mesh,
                face_index: &face_index,
                tolerance: config.lighting.light_tolerance,
                occlusion_factor: config.lighting.occlusion_factor,
            };
            let fallback = Vec3::from_array(config.lighting.fallback_light_color);

            for (node, visual) in vob::placed_visuals(&level.vobs) {
                let key = visual.to_uppercase();
                if !processed_visuals.contains(&key) {
                    let Some(asset) = level.meshes.get(visual).or_else(|| level.meshes.get(&key)) else {
                        if missing.insert(visual) {
                            log::warn!("No mesh for visual '{}', skipping its instances", visual);
                        }
                        stats.skipped_instances += 1;
                        continue;
                    };
                    let mesh = geometry::prepare_instance_mesh(&key, asset, &mut materials, optimizer)?;
                    prepared.insert(key.clone(), mesh);
                    processed_visuals.insert(key.clone());
                }

                let bbox: Aabb = node.bbox.into();
                let anchor = bbox.center();
                let receives_sun = match ground_face_at(
                    anchor,
                    &world_mesh,
                    &face_index,
                    config.lighting.ground_search_distance,
                )
                .and_then(|k| world_mesh.face(k))
                {
                    None => true,
                    Some(face) => !face.has_lightmap(),
                };
                let light = resolver.light_at(anchor);
                if light.is_some() {
                    stats.lit_instances += 1;
                }
                if receives_sun {
                    stats.sunlit_instances += 1;
                }

                placed.push(StaticInstance {
                    name: node.name.clone(),
                    visual: key,
                    transform: node.world_transform(),
                    bbox,
                    light_color: light.map_or(fallback, |l| l.color),
                    light_dir_inverted: light.map_or(Vec3::Y, |l| l.dir_inverted),
                    receives_sun,
                    cell: GridPos::new(0, 0),
                    chunk: ChunkIndex(0),
                });
            }
        }
        stats.instances = placed.len();
        log::info!(
            "Instances: {} placed, {} skipped, {} visuals, baked in {:.1}ms",
            stats.instances,
            stats.skipped_instances,
            processed_visuals.len(),
            phase.elapsed().as_secs_f64() * 1000.0
        );

        // Grid over everything that will be drawn
        phase = Instant::now();
        let bounds = placed
            .iter()
            .fold(world_mesh.bounds(), |acc, inst| acc.merged(&inst.bbox));
        if !bounds.is_valid() {
            return Err(DataError::DegenerateBounds.into());
        }
        let mut grid = ChunkGrid::new(&bounds, config.grid.cell_size, config.grid.group_size)?;

        let world_chunks = geometry::chunk_world(&world_mesh, &mut grid, optimizer, true);
        let mut instance_chunks: BTreeMap<MaterialId, ChunkedVertexData> = BTreeMap::new();
        for instance in &mut placed {
            instance.cell = grid.cell_of(instance.anchor());
            instance.chunk = grid.clamped_index(instance.cell);
            if let Some(mesh) = prepared.get(&instance.visual) {
                let baked = geometry::bake_instance(mesh, instance);
                geometry::chunk_instance(baked, instance, &mut grid, &mut instance_chunks);
            }
        }
        stats.cells_in_use = grid.cells_in_use();
        log::info!(
            "Grid: {:?} cells, {} in use, chunked in {:.1}ms",
            grid.dimensions(),
            stats.cells_in_use,
            phase.elapsed().as_secs_f64() * 1000.0
        );

        // Batches
        let mut textures = TextureCache::new(texture_source);
        let world_batches = build_batches(
            &world_chunks,
            &materials,
            &mut textures,
            &grid,
            &BatchOptions::from_config(BatchKind::World, &config.batch),
        )?;
        let instance_batches = build_batches(
            &instance_chunks,
            &materials,
            &mut textures,
            &grid,
            &BatchOptions::from_config(BatchKind::Instance, &config.batch),
        )?;
        textures.clear();

        stats.materials = materials.len();
        stats.world_batches = world_batches.len();
        stats.instance_batches = instance_batches.len();
        stats.load_ms = start.elapsed().as_secs_f64() * 1000.0;
        log::info!(
            "Level loaded in {:.1}ms: {} world batches, {} instance batches, {} materials",
            stats.load_ms,
            stats.world_batches,
            stats.instance_batches,
            stats.materials
        );

        Ok(Self {
            config,
            materials,
            world_mesh,
            face_index,
            lights,
            light_index,
            instances: placed,
            grid,
            world_batches,
            instance_batches,
            textures,
            processed_visuals,
            stats,
        })
    }

    /// Re-evaluate grid visibility for `camera`.
    pub fn update_camera(&mut self, camera: &Camera) {
        let frustum = camera.frustum();
        let close = camera.close_frustum(self.config.grid.close_radius);
        self.grid.update_camera(&frustum, &close, camera.position);
    }

    /// Ranges to draw for the last camera update.
    ///
    /// World batches draw close cells at full detail and distant cells at
    /// reduced detail. Instance batches draw every visible cell in full.
    pub fn draw_list(&self) -> FrameDrawList {
        let mut list = FrameDrawList::default();
        for (i, batch) in self.world_batches.iter().enumerate() {
            list.push(BatchDraw {
                kind: batch.kind,
                batch: i,
                full: draw_ranges(batch, &self.grid, DetailLevel::Full, VisibilityFilter::Close),
                reduced: draw_ranges(batch, &self.grid, DetailLevel::Reduced, VisibilityFilter::Distant),
            });
        }
        for (i, batch) in self.instance_batches.iter().enumerate() {
            list.push(BatchDraw {
                kind: batch.kind,
                batch: i,
                full: draw_ranges(batch, &self.grid, DetailLevel::Full, VisibilityFilter::Any),
                reduced: Vec::new(),
            });
        }
        log::debug!(
            "Frame: {} draw calls, {} batches drawn, {} culled",
            list.draw_calls,
            list.batches_drawn,
            list.batches_culled
        );
        list
    }

    /// Ground face below `point` in the world mesh
    pub fn ground_face_at(&self, point: Vec3) -> Option<FaceKey> {
        ground_face_at(point, &self.world_mesh, &self.face_index, self.config.lighting.ground_search_distance)
    }

    /// Static light at `point` with the session's settings
    pub fn light_at(&self, point: Vec3) -> Option<BakedLight> {
        StaticLightResolver {
            lights: &self.lights,
            light_index: &self.light_index,
            mesh: &self.world_mesh,
            face_index: &self.face_index,
            tolerance: self.config.lighting.light_tolerance,
            occlusion_factor: self.config.lighting.occlusion_factor,
        }
        .light_at(point)
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn world_mesh(&self) -> &MeshData {
        &self.world_mesh
    }

    pub fn face_index(&self) -> &FaceIndex {
        &self.face_index
    }

    pub fn lights(&self) -> &[StaticLight] {
        &self.lights
    }

    pub fn light_index(&self) -> &LightIndex {
        &self.light_index
    }

    pub fn instances(&self) -> &[StaticInstance] {
        &self.instances
    }

    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    pub fn world_batches(&self) -> &[Batch] {
        &self.world_batches
    }

    pub fn instance_batches(&self) -> &[Batch] {
        &self.instance_batches
    }

    /// Texture cache, empty once loading finished
    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    /// Upper-cased visuals whose mesh was validated and prepared
    pub fn processed_visuals(&self) -> &HashSet<String> {
        &self.processed_visuals
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }
}
