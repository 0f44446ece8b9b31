//! Per-frame draw ranges and per-kind draw strategies.

use crate::grid::{ChunkGrid, VisibilityFilter};

use super::texture::TextureArray;
use super::{Batch, BatchKind, Cluster};

/// Batches with fewer elements than this are drawn whole
pub const MIN_CLUSTERED_COUNT: u32 = 64;

/// Which index region of a batch to draw
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetailLevel {
    Full,
    Reduced,
}

/// Contiguous `[start, end)` span of a batch's draw space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRange {
    pub start: u32,
    pub end: u32,
}

impl DrawRange {
    pub fn count(&self) -> u32 {
        self.end - self.start
    }
}

/// Raw buffer contents a batch is drawn from
pub struct VertexStreams<'a> {
    pub positions: &'a [u8],
    pub attributes: &'a [u8],
    pub texture_layers: &'a [u8],
    pub indices: Option<&'a [u8]>,
}

/// How the submission layer binds and culls a batch.
pub trait DrawStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn vertex_streams<'a>(&self, batch: &'a Batch) -> VertexStreams<'a>;

    fn texture<'a>(&self, batch: &'a Batch) -> &'a TextureArray {
        &batch.textures
    }
}

fn streams(batch: &Batch, indexed: bool) -> VertexStreams<'_> {
    VertexStreams {
        positions: bytemuck::cast_slice(&batch.positions),
        attributes: bytemuck::cast_slice(&batch.attributes),
        texture_layers: bytemuck::cast_slice(&batch.texture_layers),
        indices: (indexed && batch.is_indexed()).then(|| bytemuck::cast_slice(&batch.indices)),
    }
}

/// Indexed world geometry, culled per cell
pub struct WorldStrategy;

impl DrawStrategy for WorldStrategy {
    fn name(&self) -> &'static str {
        "world"
    }

    fn vertex_streams<'a>(&self, batch: &'a Batch) -> VertexStreams<'a> {
        streams(batch, true)
    }
}

/// Unindexed instance geometry, culled per cell
pub struct InstanceStrategy;

impl DrawStrategy for InstanceStrategy {
    fn name(&self) -> &'static str {
        "instance"
    }

    fn vertex_streams<'a>(&self, batch: &'a Batch) -> VertexStreams<'a> {
        streams(batch, false)
    }
}

pub(crate) fn strategy_for(kind: BatchKind) -> Box<dyn DrawStrategy> {
    match kind {
        BatchKind::World => Box::new(WorldStrategy),
        BatchKind::Instance => Box::new(InstanceStrategy),
    }
}

/// Merge the spans of visible clusters into maximal ranges.
///
/// Cluster `i` spans from its start to the next cluster's start, the last one
/// to `total_count`. Empty clusters are skipped.
pub fn merge_visible_ranges(
    clusters: &[Cluster],
    total_count: u32,
    is_visible: impl Fn(&Cluster) -> bool,
) -> Vec<DrawRange> {
    let mut ranges = Vec::new();
    let mut open: Option<u32> = None;

    for (i, cluster) in clusters.iter().enumerate() {
        let end = clusters.get(i + 1).map_or(total_count, |next| next.start);
        if end <= cluster.start {
            continue;
        }
        if is_visible(cluster) {
            open.get_or_insert(cluster.start);
        } else if let Some(start) = open.take() {
            ranges.push(DrawRange { start, end: cluster.start });
        }
    }
    if let Some(start) = open {
        ranges.push(DrawRange { start, end: total_count });
    }
    ranges
}

/// Ranges of `batch` to draw this frame.
///
/// Small batches come back as one range covering the region,
/// except for the distant pass so they are not drawn twice. Unindexed batches
/// have no reduced region and draw full detail instead.
pub fn draw_ranges(batch: &Batch, grid: &ChunkGrid, detail: DetailLevel, filter: VisibilityFilter) -> Vec<DrawRange> {
    let (clusters, start, end) = match detail {
        DetailLevel::Reduced if batch.is_indexed() => {
            (&batch.lod_clusters, batch.lod_index_start, batch.indices.len() as u32)
        }
        _ => (&batch.clusters, 0, batch.draw_count()),
    };
    if end <= start {
        return Vec::new();
    }

    if end - start < MIN_CLUSTERED_COUNT {
        return match filter {
            VisibilityFilter::Distant => Vec::new(),
            _ => vec![DrawRange { start, end }],
        };
    }

    merge_visible_ranges(clusters, end, |c| grid.is_visible(c.chunk, filter))
}
