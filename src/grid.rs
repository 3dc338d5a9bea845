// Mapping between continuous geometry and discrete cell indices.
//
// Cells are addressed two ways: an "absolute" index enumerates every
// position of the cell_count box, while a CellId densely enumerates only
// the cells inside the effective geometry (all of them for a cuboid, the
// ones touching the inscribed cylinder for cylindrical geometry). Out-of-
// geometry lookups yield NO_CELL, never an error.

use nalgebra::Vector3;

use crate::config::{Config, GeometryKind};
use crate::error::SimError;

/// Dense cell index, or [`NO_CELL`].
pub type CellId = u32;
/// Sentinel for "no cell": outside the grid or outside the effective geometry.
pub const NO_CELL: CellId = u32::MAX;

#[derive(Debug, Clone)]
pub struct Grid {
    pub kind: GeometryKind,
    /// Physical extent [m].
    pub geometry_size: Vector3<f64>,
    /// Effective cell size [m]; cell_count * cell_size == geometry_size exactly.
    pub cell_size: Vector3<f64>,
    pub cell_count: Vector3<u32>,
    pub periodic: [bool; 3],
    /// Absolute index -> CellId (NO_CELL outside the effective geometry).
    cell_ids: Vec<CellId>,
    /// CellId -> integer cell position.
    cell_pos: Vec<Vector3<i32>>,
}

impl Grid {
    pub fn new(cfg: &Config) -> Result<Self, SimError> {
        cfg.validate()?;
        let cell_count = cfg.cell_count();
        // Recompute the cell size so the grid tiles the geometry exactly.
        let cell_size = Vector3::new(
            cfg.geometry_size.x / cell_count.x as f64,
            cfg.geometry_size.y / cell_count.y as f64,
            cfg.geometry_size.z / cell_count.z as f64,
        );
        let total = (cell_count.x * cell_count.y * cell_count.z) as usize;
        let mut cell_ids = vec![NO_CELL; total];
        let mut cell_pos = Vec::new();
        let mut grid = Grid {
            kind: cfg.geometry,
            geometry_size: cfg.geometry_size,
            cell_size,
            cell_count,
            periodic: cfg.periodic,
            cell_ids: Vec::new(),
            cell_pos: Vec::new(),
        };
        // z is the fastest-varying axis in the absolute ordering.
        let mut abs = 0usize;
        for x in 0..cell_count.x as i32 {
            for y in 0..cell_count.y as i32 {
                for z in 0..cell_count.z as i32 {
                    let pos = Vector3::new(x, y, z);
                    if grid.cell_in_geometry(pos) {
                        cell_ids[abs] = cell_pos.len() as CellId;
                        cell_pos.push(pos);
                    }
                    abs += 1;
                }
            }
        }
        log::debug!(
            "grid: {} of {} cells inside the effective geometry",
            cell_pos.len(),
            total
        );
        grid.cell_ids = cell_ids;
        grid.cell_pos = cell_pos;
        Ok(grid)
    }

    /// Radius of the inscribed cylinder in x-cell units.
    fn radius_cells(&self) -> f64 {
        self.cell_count.x as f64 * 0.5
    }

    /// Axis position in cell units (x and y components are used).
    fn axis_cells(&self) -> (f64, f64) {
        (
            self.cell_count.x as f64 * 0.5,
            self.cell_count.y as f64 * 0.5,
        )
    }

    /// Whether the cell box at `pos` belongs to the effective geometry.
    /// For a cylinder: at least one of its four xy-corners lies within the
    /// inscribed radius (a cell that touches the circle is kept, so the
    /// union of kept cells covers the full cylinder volume).
    fn cell_in_geometry(&self, pos: Vector3<i32>) -> bool {
        if pos.x < 0
            || pos.y < 0
            || pos.z < 0
            || pos.x >= self.cell_count.x as i32
            || pos.y >= self.cell_count.y as i32
            || pos.z >= self.cell_count.z as i32
        {
            return false;
        }
        match self.kind {
            GeometryKind::Cuboid => true,
            GeometryKind::Cylindrical => {
                let (cx, cy) = self.axis_cells();
                let r2 = self.radius_cells() * self.radius_cells();
                for dx in 0..2 {
                    for dy in 0..2 {
                        let x = (pos.x + dx) as f64 - cx;
                        let y = (pos.y + dy) as f64 - cy;
                        if x * x + y * y <= r2 {
                            return true;
                        }
                    }
                }
                false
            }
        }
    }

    /// Absolute index of an in-bounds cell position.
    fn absolute_index(&self, pos: Vector3<i32>) -> Option<usize> {
        if pos.x < 0
            || pos.y < 0
            || pos.z < 0
            || pos.x >= self.cell_count.x as i32
            || pos.y >= self.cell_count.y as i32
            || pos.z >= self.cell_count.z as i32
        {
            return None;
        }
        Some(
            ((pos.x as u32 * self.cell_count.y + pos.y as u32) * self.cell_count.z
                + pos.z as u32) as usize,
        )
    }

    /// CellId of a cell position; NO_CELL when out of bounds or outside the
    /// effective geometry. Total and deterministic.
    pub fn cell_id_of(&self, pos: Vector3<i32>) -> CellId {
        match self.absolute_index(pos) {
            Some(abs) => self.cell_ids[abs],
            None => NO_CELL,
        }
    }

    /// Inverse of [`Grid::cell_id_of`] for valid ids.
    pub fn cell_pos_of(&self, id: CellId) -> Option<Vector3<i32>> {
        self.cell_pos.get(id as usize).copied()
    }

    /// Neighboring cell along `axis` (0..3) in `dir` (-1 or +1), honoring
    /// periodic wraparound. NO_CELL past a non-periodic boundary or outside
    /// the effective geometry.
    pub fn neighbor(&self, id: CellId, axis: usize, dir: i32) -> CellId {
        let mut pos = match self.cell_pos_of(id) {
            Some(p) => p,
            None => return NO_CELL,
        };
        pos[axis] += dir;
        let n = self.cell_count[axis] as i32;
        if self.periodic[axis] {
            pos[axis] = pos[axis].rem_euclid(n);
        }
        self.cell_id_of(pos)
    }

    /// Number of cells inside the effective geometry.
    pub fn valid_cell_count(&self) -> usize {
        self.cell_pos.len()
    }

    /// Number of absolute cell positions (the full cuboid box).
    pub fn total_cell_count(&self) -> usize {
        self.cell_ids.len()
    }

    /// Absolute-index -> CellId table, for external inspection.
    pub fn cell_id_vec(&self) -> &[CellId] {
        &self.cell_ids
    }

    /// Whether an absolute position (in cell units) lies inside the
    /// effective geometry. Used for rejection sampling at creation and the
    /// wall tests during evolve.
    pub fn contains(&self, p: Vector3<f64>) -> bool {
        if p.x < 0.0
            || p.y < 0.0
            || p.z < 0.0
            || p.x > self.cell_count.x as f64
            || p.y > self.cell_count.y as f64
            || p.z > self.cell_count.z as f64
        {
            return false;
        }
        match self.kind {
            GeometryKind::Cuboid => true,
            GeometryKind::Cylindrical => {
                let (cx, cy) = self.axis_cells();
                let r = self.radius_cells();
                let dx = p.x - cx;
                let dy = p.y - cy;
                dx * dx + dy * dy <= r * r
            }
        }
    }

    /// Squared distance (in cell units) of an absolute xy position from the
    /// cylinder axis. Meaningful for cylindrical geometry only.
    pub fn radial_dist_sq(&self, p: Vector3<f64>) -> f64 {
        let (cx, cy) = self.axis_cells();
        let dx = p.x - cx;
        let dy = p.y - cy;
        dx * dx + dy * dy
    }
}
