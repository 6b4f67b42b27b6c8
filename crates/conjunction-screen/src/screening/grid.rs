//! Uniform 3D grid over instantaneous positions
//!
//! The cell edge equals the search radius, so two points closer than the
//! radius always share a cell or sit in adjacent cells (26-neighborhood).

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Integer cell coordinates: floor(position / cell_size) per axis
pub type CellKey = (i64, i64, i64);

/// Offsets of the 26 cells around a cell
pub const NEIGHBOR_OFFSETS: [(i64, i64, i64); 26] = neighbor_offsets();

const fn neighbor_offsets() -> [(i64, i64, i64); 26] {
    let mut out = [(0, 0, 0); 26];
    let mut n = 0;
    let mut dx = -1;
    while dx <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dz = -1;
            while dz <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[n] = (dx, dy, dz);
                    n += 1;
                }
                dz += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    out
}

/// Spatial index over a slice of positions
///
/// Cells hold indices into the slice the grid was built from. Read-only once built.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size_km: f64,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl SpatialGrid {
    /// Index `positions` into cells of edge `cell_size_km`
    pub fn build(positions: &[[f64; 3]], cell_size_km: f64) -> Result<Self> {
        if !(cell_size_km.is_finite() && cell_size_km > 0.0) {
            return Err(Error::config(format!(
                "grid cell size must be positive (got {})",
                cell_size_km
            )));
        }

        let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
        for (index, position) in positions.iter().enumerate() {
            cells
                .entry(cell_key(position, cell_size_km))
                .or_default()
                .push(index);
        }

        Ok(Self {
            cell_size_km,
            cells,
        })
    }

    pub fn cell_size_km(&self) -> f64 {
        self.cell_size_km
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn key_for(&self, position: &[f64; 3]) -> CellKey {
        cell_key(position, self.cell_size_km)
    }

    /// Members of one cell (empty for unoccupied cells)
    pub fn members(&self, key: &CellKey) -> &[usize] {
        self.cells.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Occupied cell keys
    pub fn keys(&self) -> Vec<CellKey> {
        self.cells.keys().copied().collect()
    }

    /// Occupied neighbors of `key`, excluding the cell itself
    pub fn neighbors(&self, key: &CellKey) -> impl Iterator<Item = (CellKey, &[usize])> + '_ {
        let (x, y, z) = *key;
        NEIGHBOR_OFFSETS.iter().filter_map(move |(dx, dy, dz)| {
            let neighbor = (x + dx, y + dy, z + dz);
            self.cells
                .get(&neighbor)
                .map(|members| (neighbor, members.as_slice()))
        })
    }
}

/// Cell key for a position
pub fn cell_key(position: &[f64; 3], cell_size_km: f64) -> CellKey {
    (
        (position[0] / cell_size_km).floor() as i64,
        (position[1] / cell_size_km).floor() as i64,
        (position[2] / cell_size_km).floor() as i64,
    )
}

/// Whether two cells are the same or touch (Chebyshev distance <= 1)
pub fn is_adjacent_or_same(a: &CellKey, b: &CellKey) -> bool {
    (a.0 - b.0).abs() <= 1 && (a.1 - b.1).abs() <= 1 && (a.2 - b.2).abs() <= 1
}
