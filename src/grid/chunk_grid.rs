//! Per-cell frustum classification with optional coarse layer cells.
//!
//! Cells start out unused. Registering geometry marks a cell in use and grows
//! its bounds; every camera update then overwrites the visibility and distance
//! fields of all in-use cells.

use glam::Vec3;

use crate::core::error::DataError;
use crate::core::types::Result;
use crate::math::{Aabb, Containment, Frustum};

use super::{ChunkIndex, GridPos};

/// Which cells a draw pass wants
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisibilityFilter {
    /// Everything inside the full frustum
    Any,
    /// Only cells inside the close frustum
    Close,
    /// Cells inside the full frustum but outside the close one
    Distant,
}

/// Visibility and distance state of one base cell
#[derive(Clone, Copy, Debug)]
pub struct CellState {
    /// Geometry was registered in this cell
    pub in_use: bool,
    /// Union of the geometry registered in this cell
    pub bounds: Aabb,
    /// Intersects the full frustum
    pub visible: bool,
    /// Intersects the close frustum (never set without `visible`)
    pub visible_close: bool,
    /// Horizontal squared distance from the bounds center to the camera
    pub distance_xz_sq: f32,
    /// Squared distance to the nearest bounds corner
    pub near_distance_sq: f32,
    /// Squared distance to the farthest bounds corner
    pub far_distance_sq: f32,
}

impl Default for CellState {
    fn default() -> Self {
        Self {
            in_use: false,
            bounds: Aabb::EMPTY,
            visible: false,
            visible_close: false,
            distance_xz_sq: f32::MAX,
            near_distance_sq: f32::MAX,
            far_distance_sq: f32::MAX,
        }
    }
}

/// Group of `group_size x group_size` base cells tested as one
#[derive(Clone, Copy, Debug)]
struct LayerCell {
    bounds: Aabb,
    in_use: bool,
}

/// 2D grid over the level footprint
pub struct ChunkGrid {
    cell_size: f32,
    /// Cell coordinate of the grid's first cell
    origin: GridPos,
    width: u32,
    height: u32,
    cells: Vec<CellState>,
    group_size: Option<u32>,
    layers: Vec<LayerCell>,
    layers_width: u32,
    layers_dirty: bool,
    /// Frustum tests run by the last camera update (both frustums)
    frustum_tests: usize,
}

impl ChunkGrid {
    /// Partition the X/Z footprint of `bounds` into cells of `cell_size`.
    pub fn new(bounds: &Aabb, cell_size: f32, group_size: Option<u32>) -> Result<Self> {
        if !bounds.is_valid() || !(cell_size > 0.0) {
            return Err(DataError::DegenerateBounds.into());
        }

        let min = GridPos::from_world(bounds.min, cell_size);
        let max = GridPos::from_world(bounds.max, cell_size);
        let width = max.x as i64 - min.x as i64 + 1;
        let height = max.y as i64 - min.y as i64 + 1;
        let too_large = || DataError::GridTooLarge { width, height, cell_size };
        // Cell coordinates are i32 and dense indices u32
        let (width, height) = i32::try_from(width)
            .ok()
            .zip(i32::try_from(height).ok())
            .map(|(w, h)| (w as u32, h as u32))
            .ok_or_else(too_large)?;
        let cell_count = width.checked_mul(height).ok_or_else(too_large)?;

        let group_size = group_size.filter(|&g| g > 1);
        let (layers_width, layers_height) = match group_size {
            Some(g) => (width.div_ceil(g), height.div_ceil(g)),
            None => (0, 0),
        };

        log::debug!(
            "Chunk grid {}x{} cells of {} units, {}x{} layer cells",
            width, height, cell_size, layers_width, layers_height
        );

        Ok(Self {
            cell_size,
            origin: min,
            width,
            height,
            cells: vec![CellState::default(); cell_count as usize],
            group_size,
            layers: vec![
                LayerCell { bounds: Aabb::EMPTY, in_use: false };
                (layers_width * layers_height) as usize
            ],
            layers_width,
            layers_dirty: false,
            frustum_tests: 0,
        })
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Grid dimensions in cells (x, y)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Union of the bounds of all cells in use, `Aabb::EMPTY` if none
    pub fn bounds(&self) -> Aabb {
        self.cells
            .iter()
            .filter(|c| c.in_use)
            .fold(Aabb::EMPTY, |acc, c| acc.merged(&c.bounds))
    }

    /// Cell containing `point`, clamped into the grid.
    pub fn cell_of(&self, point: Vec3) -> GridPos {
        self.clamp_pos(GridPos::from_world(point, self.cell_size))
    }

    /// Dense index of `pos`, `None` outside the grid.
    pub fn cell_index(&self, pos: GridPos) -> Option<ChunkIndex> {
        let x = pos.x - self.origin.x;
        let y = pos.y - self.origin.y;
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(ChunkIndex(y as u32 * self.width + x as u32))
    }

    /// Cell coordinate of a dense index
    pub fn pos_of(&self, index: ChunkIndex) -> GridPos {
        GridPos::new(
            self.origin.x + (index.0 % self.width) as i32,
            self.origin.y + (index.0 / self.width) as i32,
        )
    }

    /// Nearest cell inside the grid
    pub fn clamp_pos(&self, pos: GridPos) -> GridPos {
        GridPos::new(
            pos.x.clamp(self.origin.x, self.origin.x + self.width as i32 - 1),
            pos.y.clamp(self.origin.y, self.origin.y + self.height as i32 - 1),
        )
    }

    /// Dense index of `pos` after clamping it into the grid
    pub fn clamped_index(&self, pos: GridPos) -> ChunkIndex {
        let pos = self.clamp_pos(pos);
        ChunkIndex((pos.y - self.origin.y) as u32 * self.width + (pos.x - self.origin.x) as u32)
    }

    /// Register geometry in the cell at `pos` (clamped into the grid).
    pub fn include(&mut self, pos: GridPos, aabb: &Aabb) -> ChunkIndex {
        let pos = self.clamp_pos(pos);
        let index = self.clamped_index(pos);

        // Footprint of the cell itself, so cells always cover their rectangle
        let footprint = Aabb::new(
            Vec3::new(pos.x as f32 * self.cell_size, aabb.min.y, pos.y as f32 * self.cell_size),
            Vec3::new((pos.x + 1) as f32 * self.cell_size, aabb.max.y, (pos.y + 1) as f32 * self.cell_size),
        );

        let cell = &mut self.cells[index.0 as usize];
        cell.in_use = true;
        cell.bounds = cell.bounds.merged(aabb).merged(&footprint);
        self.layers_dirty = true;
        index
    }

    /// Register a single point in the cell containing it.
    pub fn include_point(&mut self, point: Vec3) -> ChunkIndex {
        let pos = self.cell_of(point);
        self.include(pos, &Aabb::new(point, point))
    }

    /// Register a box in the cell containing its center.
    pub fn include_aabb(&mut self, aabb: &Aabb) -> ChunkIndex {
        let pos = self.cell_of(aabb.center());
        self.include(pos, aabb)
    }

    pub fn state(&self, index: ChunkIndex) -> &CellState {
        &self.cells[index.0 as usize]
    }

    pub fn cells_in_use(&self) -> usize {
        self.cells.iter().filter(|c| c.in_use).count()
    }

    /// Whether the cell passes `filter` for the current camera
    pub fn is_visible(&self, index: ChunkIndex, filter: VisibilityFilter) -> bool {
        let cell = &self.cells[index.0 as usize];
        match filter {
            VisibilityFilter::Any => cell.visible,
            VisibilityFilter::Close => cell.visible_close,
            VisibilityFilter::Distant => cell.visible && !cell.visible_close,
        }
    }

    pub fn visible_count(&self, filter: VisibilityFilter) -> usize {
        (0..self.cells.len() as u32)
            .filter(|&i| self.is_visible(ChunkIndex(i), filter))
            .count()
    }

    /// Frustum tests run by the last `update_camera`
    pub fn frustum_tests(&self) -> usize {
        self.frustum_tests
    }

    fn rebuild_layers(&mut self) {
        let Some(g) = self.group_size else {
            self.layers_dirty = false;
            return;
        };
        for layer in &mut self.layers {
            *layer = LayerCell { bounds: Aabb::EMPTY, in_use: false };
        }
        for (i, cell) in self.cells.iter().enumerate() {
            if !cell.in_use {
                continue;
            }
            let x = i as u32 % self.width;
            let y = i as u32 / self.width;
            let layer = &mut self.layers[((y / g) * self.layers_width + x / g) as usize];
            layer.in_use = true;
            layer.bounds = layer.bounds.merged(&cell.bounds);
        }
        self.layers_dirty = false;
    }

    /// Re-evaluate every in-use cell against the camera.
    ///
    /// Layer cells are classified once per frustum. Children of a contained
    /// layer are visible and children of a disjoint layer are not, without
    /// further tests; only children of intersecting layers are tested.
    pub fn update_camera(&mut self, frustum: &Frustum, close_frustum: &Frustum, camera_pos: Vec3) {
        if self.layers_dirty {
            self.rebuild_layers();
        }
        self.frustum_tests = 0;

        let Some(g) = self.group_size else {
            for i in 0..self.cells.len() {
                self.evaluate_cell(i, Containment::Intersects, Containment::Intersects, frustum, close_frustum, camera_pos);
            }
            return;
        };

        for layer_index in 0..self.layers.len() {
            let layer = self.layers[layer_index];
            let lx = layer_index as u32 % self.layers_width;
            let ly = layer_index as u32 / self.layers_width;

            let (parent, parent_close) = if layer.in_use {
                self.frustum_tests += 2;
                (frustum.classify_aabb(&layer.bounds), close_frustum.classify_aabb(&layer.bounds))
            } else {
                (Containment::Disjoint, Containment::Disjoint)
            };

            for y in (ly * g)..((ly + 1) * g).min(self.height) {
                for x in (lx * g)..((lx + 1) * g).min(self.width) {
                    let i = (y * self.width + x) as usize;
                    self.evaluate_cell(i, parent, parent_close, frustum, close_frustum, camera_pos);
                }
            }
        }
    }

    fn evaluate_cell(
        &mut self,
        i: usize,
        parent: Containment,
        parent_close: Containment,
        frustum: &Frustum,
        close_frustum: &Frustum,
        camera_pos: Vec3,
    ) {
        let cell = self.cells[i];
        if !cell.in_use {
            self.cells[i].visible = false;
            self.cells[i].visible_close = false;
            return;
        }

        let mut tests = 0;
        let mut inherit = |containment: Containment, f: &Frustum| match containment {
            Containment::Contains => true,
            Containment::Disjoint => false,
            Containment::Intersects => {
                tests += 1;
                f.intersects_aabb(&cell.bounds)
            }
        };
        let visible = inherit(parent, frustum);
        let visible_close = visible && inherit(parent_close, close_frustum);
        self.frustum_tests += tests;

        let center = cell.bounds.center();
        let (mut near, mut far) = (f32::MAX, 0.0f32);
        for corner in cell.bounds.corners() {
            let d = corner.distance_squared(camera_pos);
            near = near.min(d);
            far = far.max(d);
        }

        let state = &mut self.cells[i];
        state.visible = visible;
        state.visible_close = visible_close;
        state.distance_xz_sq = (center.x - camera_pos.x).powi(2) + (center.z - camera_pos.z).powi(2);
        state.near_distance_sq = near;
        state.far_distance_sq = far;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::Camera;

    /// 8x8 grid of 10-unit cells, all in use, geometry from y=0 to y=2
    fn filled_grid(group_size: Option<u32>) -> ChunkGrid {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(79.9, 2.0, 79.9));
        let mut grid = ChunkGrid::new(&bounds, 10.0, group_size).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                let min = Vec3::new(x as f32 * 10.0, 0.0, y as f32 * 10.0);
                grid.include(GridPos::new(x, y), &Aabb::new(min, min + Vec3::new(10.0, 2.0, 10.0)));
            }
        }
        grid
    }

    fn camera_over(pos: Vec3, target: Vec3) -> Camera {
        let mut camera = Camera::look_at(pos, target, Vec3::Y);
        camera.near = 0.5;
        camera.far = 1000.0;
        camera.aspect = 1.0;
        camera
    }

    #[test]
    fn test_new_rejects_empty_bounds() {
        assert!(ChunkGrid::new(&Aabb::EMPTY, 10.0, None).is_err());
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(ChunkGrid::new(&bounds, 0.0, None).is_err());
    }

    #[test]
    fn test_new_rejects_unaddressable_grid() {
        let bounds = Aabb::new(Vec3::splat(-1.0e6), Vec3::splat(1.0e6));
        let err = ChunkGrid::new(&bounds, 0.01, Some(4)).err().unwrap();
        assert!(matches!(err, Error::Data(DataError::GridTooLarge { .. })));

        // Wide but flat footprints still fit
        let strip = Aabb::new(Vec3::ZERO, Vec3::new(1.0e5, 1.0, 0.5));
        let grid = ChunkGrid::new(&strip, 1.0, None).unwrap();
        assert_eq!(grid.dimensions(), (100_001, 1));
    }

    #[test]
    fn test_dimensions_and_indexing() {
        let bounds = Aabb::new(Vec3::new(-15.0, 0.0, -5.0), Vec3::new(25.0, 10.0, 12.0));
        let grid = ChunkGrid::new(&bounds, 10.0, None).unwrap();
        assert_eq!(grid.dimensions(), (5, 3));

        let index = grid.cell_index(GridPos::new(0, 0)).unwrap();
        assert_eq!(grid.pos_of(index), GridPos::new(0, 0));
        assert!(grid.cell_index(GridPos::new(3, 0)).is_none());

        // Out-of-range points clamp to the border
        assert_eq!(grid.cell_of(Vec3::new(1000.0, 0.0, -1000.0)), GridPos::new(2, -1));
    }

    #[test]
    fn test_include_marks_in_use() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(30.0, 5.0, 30.0));
        let mut grid = ChunkGrid::new(&bounds, 10.0, None).unwrap();
        assert_eq!(grid.cells_in_use(), 0);

        let tri = Aabb::new(Vec3::new(11.0, 1.0, 11.0), Vec3::new(14.0, 3.0, 12.0));
        let index = grid.include(GridPos::new(1, 1), &tri);
        assert_eq!(grid.cells_in_use(), 1);
        assert!(grid.state(index).in_use);
        // X/Z cover the whole cell, Y follows the geometry
        assert_eq!(
            grid.state(index).bounds,
            Aabb::new(Vec3::new(10.0, 1.0, 10.0), Vec3::new(20.0, 3.0, 20.0))
        );
    }

    #[test]
    fn test_include_point_and_aabb() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(30.0, 5.0, 30.0));
        let mut grid = ChunkGrid::new(&bounds, 10.0, None).unwrap();

        let a = grid.include_point(Vec3::new(25.0, 4.0, 5.0));
        assert_eq!(grid.pos_of(a), GridPos::new(2, 0));

        // Box centered in cell (0, 2), reaching into its neighbour
        let b = grid.include_aabb(&Aabb::new(Vec3::new(2.0, -1.0, 21.0), Vec3::new(12.0, 1.0, 23.0)));
        assert_eq!(grid.pos_of(b), GridPos::new(0, 2));
        assert_eq!(grid.state(b).bounds.max.x, 12.0);
        assert_eq!(grid.cells_in_use(), 2);
        assert_eq!(grid.bounds(), Aabb::new(Vec3::new(0.0, -1.0, 0.0), Vec3::new(30.0, 4.0, 30.0)));

        // Outside the footprint clamps to the border cell
        let c = grid.include_point(Vec3::new(-50.0, 0.0, 100.0));
        assert_eq!(grid.pos_of(c), GridPos::new(0, 3));
    }

    #[test]
    fn test_unused_cells_never_visible() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(30.0, 5.0, 30.0));
        let mut grid = ChunkGrid::new(&bounds, 10.0, Some(2)).unwrap();
        let camera = camera_over(Vec3::new(15.0, 100.0, 15.0), Vec3::new(15.0, 0.0, 15.1));
        grid.update_camera(&camera.frustum(), &camera.close_frustum(50.0), camera.position);
        assert_eq!(grid.visible_count(VisibilityFilter::Any), 0);
        assert_eq!(grid.frustum_tests(), 0);
    }

    #[test]
    fn test_camera_looking_away_sees_nothing() {
        let mut grid = filled_grid(Some(4));
        let camera = camera_over(Vec3::new(40.0, 5.0, -10.0), Vec3::new(40.0, 5.0, -100.0));
        grid.update_camera(&camera.frustum(), &camera.close_frustum(30.0), camera.position);
        assert_eq!(grid.visible_count(VisibilityFilter::Any), 0);
    }

    #[test]
    fn test_contained_layers_skip_cell_tests() {
        // Camera high above, looking straight down: the whole grid is inside
        let mut grid = filled_grid(Some(4));
        let camera = camera_over(Vec3::new(40.0, 300.0, 40.0), Vec3::new(40.0, 0.0, 40.01));
        grid.update_camera(&camera.frustum(), &camera.close_frustum(1000.0), camera.position);

        assert_eq!(grid.visible_count(VisibilityFilter::Any), 64);
        // 4 layers x 2 frustums, no per-cell tests
        assert_eq!(grid.frustum_tests(), 8);
    }

    #[test]
    fn test_grouping_matches_flat_evaluation() {
        let camera = camera_over(Vec3::new(-5.0, 10.0, -5.0), Vec3::new(30.0, 0.0, 50.0));
        let frustum = camera.frustum();
        let close = camera.close_frustum(40.0);

        let mut flat = filled_grid(None);
        let mut grouped = filled_grid(Some(3));
        flat.update_camera(&frustum, &close, camera.position);
        grouped.update_camera(&frustum, &close, camera.position);

        for i in 0..flat.cell_count() as u32 {
            let a = flat.state(ChunkIndex(i));
            let b = grouped.state(ChunkIndex(i));
            assert_eq!(a.visible, b.visible, "cell {}", i);
            assert_eq!(a.visible_close, b.visible_close, "cell {}", i);
        }
        assert!(grouped.frustum_tests() <= flat.frustum_tests() + 2 * 9);
    }

    #[test]
    fn test_close_visibility_is_subset() {
        let mut grid = filled_grid(Some(2));
        let camera = camera_over(Vec3::new(-5.0, 10.0, -5.0), Vec3::new(40.0, 0.0, 40.0));
        grid.update_camera(&camera.frustum(), &camera.close_frustum(25.0), camera.position);

        let close = grid.visible_count(VisibilityFilter::Close);
        let any = grid.visible_count(VisibilityFilter::Any);
        let distant = grid.visible_count(VisibilityFilter::Distant);
        assert!(close > 0);
        assert!(close < any);
        assert_eq!(close + distant, any);
    }

    #[test]
    fn test_distance_fields() {
        let mut grid = filled_grid(None);
        let camera = camera_over(Vec3::new(5.0, 1.0, 5.0), Vec3::new(5.0, 1.0, 50.0));
        grid.update_camera(&camera.frustum(), &camera.close_frustum(20.0), camera.position);

        let index = grid.cell_index(GridPos::new(0, 0)).unwrap();
        let state = grid.state(index);
        // Camera stands above the cell center
        assert!(state.distance_xz_sq < 1e-4);
        assert!(state.near_distance_sq <= state.far_distance_sq);
        // Farthest corner of a 10x2x10 box seen from (5,1,5)
        assert!((state.far_distance_sq - 51.0).abs() < 1e-3);

        let other = grid.state(grid.cell_index(GridPos::new(3, 0)).unwrap());
        assert!((other.distance_xz_sq - 900.0).abs() < 1e-3);
    }
}
