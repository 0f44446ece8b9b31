//! Grouping per-material geometry into batches.
//!
//! Materials are bucketed by blend mode and texture layout, buckets are cut
//! whenever a texture array would overflow, and every resulting group is
//! flattened cell by cell. Groups that exceed the buffer budget are split at
//! cell boundaries.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::core::config::BatchConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::grid::{ChunkGrid, ChunkIndex, GridPos};
use crate::mesh::{BlendMode, ChunkedVertexData, MaterialId, MaterialTable, VertexData};

use super::draw::strategy_for;
use super::texture::{TextureArray, TextureCache, TextureData, TextureLayout};
use super::{Batch, BatchKind, Cluster};

/// Budgets and layout of the batches to build
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchOptions {
    pub kind: BatchKind,
    pub max_textures_per_batch: u32,
    pub max_verts_per_batch: u32,
    /// Emit an index buffer (with a reduced detail region)
    pub indexed: bool,
}

impl BatchOptions {
    /// Options for `kind` with budgets from `config`. Only world batches are
    /// indexed.
    pub fn from_config(kind: BatchKind, config: &BatchConfig) -> Self {
        Self {
            kind,
            max_textures_per_batch: config.max_textures_per_batch,
            max_verts_per_batch: config.max_verts_per_batch,
            indexed: kind == BatchKind::World,
        }
    }
}

/// Geometry of one material in one cell
struct Group<'a> {
    cell: GridPos,
    chunk: ChunkIndex,
    material: MaterialId,
    layer: u32,
    data: &'a VertexData,
}

impl Group<'_> {
    /// Vertices this group adds; unindexed output expands indexed input
    fn vertex_count(&self, indexed: bool) -> usize {
        if !indexed && self.data.is_indexed() {
            self.data.indices.len()
        } else {
            self.data.vertex_count()
        }
    }

    /// Full plus reduced detail indices this group adds
    fn index_count(&self, indexed: bool) -> usize {
        if !indexed {
            return 0;
        }
        let full = self.data.draw_count();
        let lod = if self.data.lod_indices.is_empty() { full } else { self.data.lod_indices.len() };
        full + lod
    }
}

/// All groups of one grid cell. Never split across batches.
struct Chunk<'a> {
    cell: GridPos,
    groups: Vec<Group<'a>>,
    vertices: usize,
    indices: usize,
}

/// Build batches from per-material chunked geometry.
///
/// Textures are loaded through `textures`. The result is sorted by draw count,
/// largest first.
pub fn build_batches(
    mesh_data: &BTreeMap<MaterialId, ChunkedVertexData>,
    materials: &MaterialTable,
    textures: &mut TextureCache,
    grid: &ChunkGrid,
    options: &BatchOptions,
) -> Result<Vec<Batch>> {
    let start = Instant::now();
    let max_textures = options.max_textures_per_batch.max(1) as usize;
    let budget = options.max_verts_per_batch.max(1) as usize;

    let mut buckets: BTreeMap<(BlendMode, TextureLayout), Vec<(MaterialId, Arc<TextureData>)>> =
        BTreeMap::new();
    for (&id, chunked) in mesh_data {
        if chunked.is_empty() {
            continue;
        }
        let material = materials.get(id);
        let texture = textures.get(&material.texture, material.srgb)?;
        buckets
            .entry((material.blend, texture.layout))
            .or_default()
            .push((id, texture));
    }

    let mut batches = Vec::new();
    for ((blend, layout), entries) in buckets {
        for (ids, layers) in split_by_texture_count(entries, max_textures) {
            let array = Arc::new(TextureArray::new(layout, layers)?);
            let chunks = collect_chunks(&ids, mesh_data, materials, &array, grid, options.indexed)?;
            for part in split_by_budget(chunks, budget) {
                let batch = assemble(part, options, blend, Arc::clone(&array));
                log::debug!("{:?}", batch);
                batches.push(batch);
            }
        }
    }

    batches.sort_by(|a, b| b.draw_count().cmp(&a.draw_count()));

    log::info!(
        "Built {} {:?} batches from {} materials in {:.1}ms",
        batches.len(),
        options.kind,
        mesh_data.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(batches)
}

/// Cut a bucket whenever the next distinct texture would overflow the array.
fn split_by_texture_count(
    entries: Vec<(MaterialId, Arc<TextureData>)>,
    max_textures: usize,
) -> Vec<(Vec<MaterialId>, Vec<Arc<TextureData>>)> {
    let mut out = Vec::new();
    let mut ids = Vec::new();
    let mut layers: Vec<Arc<TextureData>> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (id, texture) in entries {
        if !seen.contains(&texture.name) {
            if layers.len() == max_textures {
                out.push((std::mem::take(&mut ids), std::mem::take(&mut layers)));
                seen.clear();
            }
            seen.insert(texture.name.clone());
            layers.push(texture);
        }
        ids.push(id);
    }
    if !ids.is_empty() {
        out.push((ids, layers));
    }
    out
}

/// Gather the groups of `ids` sorted by cell (row-major) then material and
/// cut them into chunks.
fn collect_chunks<'a>(
    ids: &[MaterialId],
    mesh_data: &'a BTreeMap<MaterialId, ChunkedVertexData>,
    materials: &MaterialTable,
    array: &TextureArray,
    grid: &ChunkGrid,
    indexed: bool,
) -> Result<Vec<Chunk<'a>>> {
    let mut groups = Vec::new();
    for &id in ids {
        let Some(chunked) = mesh_data.get(&id) else {
            continue;
        };
        let texture = materials.get(id).texture.to_uppercase();
        let layer = array.layer_of(&texture).ok_or_else(|| Error::Texture {
            name: texture.clone(),
            reason: "missing from batch texture array".into(),
        })?;
        for (&cell, data) in &chunked.chunks {
            if data.is_empty() {
                continue;
            }
            groups.push(Group { cell, chunk: grid.clamped_index(cell), material: id, layer, data });
        }
    }
    groups.sort_by_key(|g| (g.cell, g.material));

    let mut chunks: Vec<Chunk<'a>> = Vec::new();
    for group in groups {
        let vertices = group.vertex_count(indexed);
        let indices = group.index_count(indexed);
        match chunks.last_mut() {
            Some(chunk) if chunk.cell == group.cell => {
                chunk.vertices += vertices;
                chunk.indices += indices;
                chunk.groups.push(group);
            }
            _ => chunks.push(Chunk { cell: group.cell, groups: vec![group], vertices, indices }),
        }
    }
    Ok(chunks)
}

/// Pack whole chunks into parts that stay within `budget` vertices and
/// indices. A chunk larger than the budget gets a part of its own.
fn split_by_budget(chunks: Vec<Chunk<'_>>, budget: usize) -> Vec<Vec<Chunk<'_>>> {
    let mut parts = Vec::new();
    let mut current: Vec<Chunk<'_>> = Vec::new();
    let (mut vertices, mut indices) = (0, 0);

    for chunk in chunks {
        if !current.is_empty() && (vertices + chunk.vertices > budget || indices + chunk.indices > budget) {
            parts.push(std::mem::take(&mut current));
            vertices = 0;
            indices = 0;
        }
        if chunk.vertices > budget || chunk.indices > budget {
            log::warn!(
                "Cell {:?} alone holds {} vertices and {} indices, over the budget of {}",
                chunk.cell, chunk.vertices, chunk.indices, budget
            );
        }
        vertices += chunk.vertices;
        indices += chunk.indices;
        current.push(chunk);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Flatten chunks into one batch with clusters starting at zero.
fn assemble(part: Vec<Chunk<'_>>, options: &BatchOptions, blend: BlendMode, textures: Arc<TextureArray>) -> Batch {
    let vertex_total: usize = part.iter().map(|c| c.vertices).sum();
    let index_total: usize = part.iter().map(|c| c.indices).sum();

    let mut positions = Vec::with_capacity(vertex_total);
    let mut attributes = Vec::with_capacity(vertex_total);
    let mut texture_layers = Vec::with_capacity(vertex_total);
    let mut indices = Vec::with_capacity(index_total);
    let mut clusters = Vec::new();
    let mut lod_groups: Vec<(Cluster, Vec<u32>)> = Vec::new();

    for group in part.iter().flat_map(|chunk| chunk.groups.iter()) {
        let data = group.data;
        let base = positions.len() as u32;
        let start = (if options.indexed { indices.len() } else { positions.len() }) as u32;
        clusters.push(Cluster { cell: group.cell, chunk: group.chunk, start });

        if options.indexed {
            positions.extend_from_slice(data.positions());
            attributes.extend_from_slice(data.attributes());

            let full: Vec<u32> = if data.is_indexed() {
                data.indices.iter().map(|i| i + base).collect()
            } else {
                (base..base + data.vertex_count() as u32).collect()
            };
            let lod = if data.lod_indices.is_empty() {
                full.clone()
            } else {
                data.lod_indices.iter().map(|i| i + base).collect()
            };
            indices.extend_from_slice(&full);
            lod_groups.push((Cluster { cell: group.cell, chunk: group.chunk, start: 0 }, lod));
        } else if data.is_indexed() {
            for &i in &data.indices {
                positions.push(data.positions()[i as usize]);
                attributes.push(data.attributes()[i as usize]);
            }
        } else {
            positions.extend_from_slice(data.positions());
            attributes.extend_from_slice(data.attributes());
        }

        texture_layers.resize(positions.len(), group.layer);
    }

    let lod_index_start = indices.len() as u32;
    let mut lod_clusters = Vec::with_capacity(lod_groups.len());
    for (mut cluster, lod) in lod_groups {
        cluster.start = indices.len() as u32;
        lod_clusters.push(cluster);
        indices.extend(lod);
    }

    Batch {
        kind: options.kind,
        blend,
        positions,
        attributes,
        texture_layers,
        indices,
        textures,
        clusters,
        lod_clusters,
        lod_index_start,
        strategy: strategy_for(options.kind),
    }
}
