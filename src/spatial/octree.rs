//! Immutable loose octree over boxed entities.
//!
//! Entities are stored once in a flat array. Each node keeps the indices of
//! the entities that straddle its octant boundaries; entities that fit inside
//! a single octant move down. Pruning uses the tight bounds of everything
//! below a node, so float error in octant bounds cannot hide an entity.

use rayon::prelude::*;

use crate::core::config::OctreeConfig;
use crate::math::Aabb;

/// Widening applied to segment query boxes
const SEGMENT_EPSILON: f32 = 1e-3;

/// A single octree node.
#[derive(Clone, Debug)]
struct OctreeNode {
    /// Union of all entity boxes in this subtree
    content: Aabb,
    /// Entities stored at this node (indices into `items`)
    entries: Vec<u32>,
    /// Non-empty children only
    children: Vec<OctreeNode>,
}

/// Octree mapping boxes to ids.
pub struct Octree<T> {
    items: Vec<(T, Aabb)>,
    root: Option<OctreeNode>,
}

impl<T: Copy + Send + Sync> Octree<T> {
    /// Build the tree in one pass. An empty input yields an empty tree.
    pub fn build(items: Vec<(T, Aabb)>, config: &OctreeConfig) -> Self {
        if items.is_empty() {
            return Self { items, root: None };
        }

        let start = std::time::Instant::now();
        let content = items.iter().fold(Aabb::EMPTY, |acc, (_, b)| acc.merged(b));

        // Cubic root so octants stay evenly shaped
        let half = content.half_extent().max_element().max(SEGMENT_EPSILON);
        let root_bounds = Aabb::from_center_half_extent(content.center(), glam::Vec3::splat(half));

        let indices: Vec<u32> = (0..items.len() as u32).collect();
        let root = build_node(&items, root_bounds, indices, 0, config);

        log::debug!(
            "Built octree over {} entities in {:.1}ms",
            items.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Self { items, root: Some(root) }
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bounds of all indexed entities, `None` when empty.
    pub fn bounds(&self) -> Option<Aabb> {
        self.root.as_ref().map(|r| r.content)
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&OctreeNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// All entities whose box intersects `query`, or lies fully inside it when
    /// `fully_contained` is set.
    pub fn range_search(&self, query: &Aabb, fully_contained: bool) -> Vec<T> {
        let mut out = Vec::new();
        let Some(root) = &self.root else {
            return out;
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !node.content.intersects(query) {
                continue;
            }
            if query.contains_aabb(&node.content) {
                // Whole subtree qualifies in both modes
                self.collect_subtree(node, &mut out);
                continue;
            }
            for &i in &node.entries {
                let (id, aabb) = &self.items[i as usize];
                let hit = if fully_contained {
                    query.contains_aabb(aabb)
                } else {
                    query.intersects(aabb)
                };
                if hit {
                    out.push(*id);
                }
            }
            stack.extend(node.children.iter());
        }
        out
    }

    /// Broad phase for a line segment: entities intersecting the box swept by
    /// the segment from `a` to `b`.
    pub fn segment_search(&self, a: glam::Vec3, b: glam::Vec3) -> Vec<T> {
        let swept = Aabb::from_points([a, b]).widened(SEGMENT_EPSILON);
        self.range_search(&swept, false)
    }

    fn collect_subtree(&self, node: &OctreeNode, out: &mut Vec<T>) {
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            out.extend(node.entries.iter().map(|&i| self.items[i as usize].0));
            stack.extend(node.children.iter());
        }
    }
}

fn build_node<T: Send + Sync>(
    items: &[(T, Aabb)],
    bounds: Aabb,
    indices: Vec<u32>,
    depth: u32,
    config: &OctreeConfig,
) -> OctreeNode {
    let content = indices
        .iter()
        .fold(Aabb::EMPTY, |acc, &i| acc.merged(&items[i as usize].1));

    if indices.len() <= config.leaf_capacity || depth >= config.max_depth {
        return OctreeNode { content, entries: indices, children: Vec::new() };
    }

    let total = indices.len();
    let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); 8];
    let mut entries = Vec::new();
    for i in indices {
        match bounds.octant_containing(&items[i as usize].1) {
            Some(octant) => buckets[octant as usize].push(i),
            None => entries.push(i),
        }
    }

    if entries.len() == total {
        // Nothing fits a single octant, splitting would not help
        return OctreeNode { content, entries, children: Vec::new() };
    }

    let build_child = |(octant, bucket): (usize, Vec<u32>)| {
        build_node(items, bounds.child_octant(octant as u8), bucket, depth + 1, config)
    };

    let children: Vec<OctreeNode> = if config.parallel && total >= config.parallel_threshold {
        buckets
            .into_par_iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(build_child)
            .collect()
    } else {
        buckets
            .into_iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(build_child)
            .collect()
    };

    OctreeNode { content, entries, children }
}
