//! Uniform hash grid over pore centers
//!
//! Cell size equals the search radius, so every pair closer than the radius lies in the
//! same or an adjacent cell.

use crate::core_types::Vec3;
use rustc_hash::FxHashMap;

type CellKey = (i64, i64, i64);

/// Spatial index bucketing dense pore indices by grid cell
pub struct SpatialIndex {
    cells: FxHashMap<CellKey, Vec<usize>>,
    cell_size: f64,
}

impl SpatialIndex {
    /// Build an index over `positions` with the given cell size.
    ///
    /// Returns `None` when `cell_size` is not finite and positive.
    pub fn build(positions: impl IntoIterator<Item = Vec3>, cell_size: f64) -> Option<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return None;
        }
        let mut index = Self {
            cells: FxHashMap::default(),
            cell_size,
        };
        for (i, pos) in positions.into_iter().enumerate() {
            let key = index.cell_of(&pos);
            index.cells.entry(key).or_default().push(i);
        }
        Some(index)
    }

    fn cell_of(&self, pos: &Vec3) -> CellKey {
        (
            (pos.x / self.cell_size).floor() as i64,
            (pos.y / self.cell_size).floor() as i64,
            (pos.z / self.cell_size).floor() as i64,
        )
    }

    /// Indices stored in the 27 cells around `pos`, including `pos`'s own cell.
    pub fn query_neighborhood(&self, pos: &Vec3) -> Vec<usize> {
        let (cx, cy, cz) = self.cell_of(pos);
        let mut results = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                        results.extend_from_slice(bucket);
                    }
                }
            }
        }
        results
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}
