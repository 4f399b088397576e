//! Partitioning of the world rectangle into one cell per worker.
//!
//! The grid is square: with `n` workers it has `floor(sqrt(n))` cells per
//! side, numbered row-major. Cell sizes are integer divisions of the world
//! extent, so any remainder along an axis is left uncovered. Workers beyond
//! the square get no cell.

use spatial_math::{Aabb, DVec2};

/// One rectangle of the grid and the slot of the worker owning it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionCell {
    pub bounds: Aabb,
    /// Position of the owner among the workers partitioned over.
    pub worker_index: usize,
}

/// Number of cells along each side of the grid for `workers` workers.
#[must_use]
pub fn cells_per_side(workers: usize) -> usize {
    workers.isqrt()
}

/// Split `bounds` into cells for `workers` workers.
///
/// Cell `(x, y)` gets index `y * side + x`.
#[must_use]
pub fn partition(bounds: &Aabb, workers: usize) -> Vec<PartitionCell> {
    let side = cells_per_side(workers);
    if side == 0 {
        return Vec::new();
    }

    let extent = bounds.size();
    let x_size = (extent.x as i64 / side as i64) as f64;
    let y_size = (extent.y as i64 / side as i64) as f64;

    let mut cells = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            let min = bounds.min + DVec2::new(x as f64 * x_size, y as f64 * y_size);
            cells.push(PartitionCell {
                bounds: Aabb::new(min, min + DVec2::new(x_size, y_size)),
                worker_index: y * side + x,
            });
        }
    }
    cells
}

/// A computed grid with point lookup.
#[derive(Debug, Clone, Default)]
pub struct PartitionGrid {
    cells: Vec<PartitionCell>,
}

impl PartitionGrid {
    #[must_use]
    pub fn new(bounds: &Aabb, workers: usize) -> Self {
        Self {
            cells: partition(bounds, workers),
        }
    }

    #[must_use]
    pub fn cells(&self) -> &[PartitionCell] {
        &self.cells
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The first cell, in index order, containing `point`.
    #[must_use]
    pub fn cell_containing(&self, point: DVec2) -> Option<&PartitionCell> {
        self.cells.iter().find(|cell| cell.bounds.contains(point))
    }

    /// How many of `workers` workers were left without a cell.
    #[must_use]
    pub fn unassigned_workers(&self, workers: usize) -> usize {
        workers.saturating_sub(self.cells.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> Aabb {
        Aabb::from_corners(0.0, 0.0, 2048.0, 1024.0)
    }

    fn covered_area(cells: &[PartitionCell]) -> f64 {
        cells.iter().map(|c| c.bounds.area()).sum()
    }

    #[test]
    fn test_no_workers_no_cells() {
        assert!(partition(&world(), 0).is_empty());
    }

    #[test]
    fn test_single_worker_covers_world() {
        let cells = partition(&world(), 1);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].bounds, world());
        assert_eq!(cells[0].worker_index, 0);
    }

    #[test]
    fn test_four_workers_row_major() {
        let cells = partition(&world(), 4);
        let expected = [
            Aabb::from_corners(0.0, 0.0, 1024.0, 512.0),
            Aabb::from_corners(1024.0, 0.0, 2048.0, 512.0),
            Aabb::from_corners(0.0, 512.0, 1024.0, 1024.0),
            Aabb::from_corners(1024.0, 512.0, 2048.0, 1024.0),
        ];
        assert_eq!(cells.len(), 4);
        for (i, (cell, bounds)) in cells.iter().zip(expected).enumerate() {
            assert_eq!(cell.worker_index, i);
            assert_eq!(cell.bounds, bounds);
        }
    }

    #[test]
    fn test_perfect_squares_tile_without_overlap() {
        for workers in [1, 4, 16] {
            let cells = partition(&world(), workers);
            assert_eq!(cells.len(), workers);
            assert_eq!(covered_area(&cells), world().area());
            for (i, a) in cells.iter().enumerate() {
                for b in &cells[i + 1..] {
                    assert!(a.bounds.intersection(&b.bounds).is_none());
                }
            }
        }
    }

    #[test]
    fn test_remainder_left_uncovered() {
        // 2048 / 3 = 682 and 1024 / 3 = 341 in whole units.
        let cells = partition(&world(), 9);
        assert_eq!(cells.len(), 9);
        assert_eq!(covered_area(&cells), (682.0 * 3.0) * (341.0 * 3.0));
        assert_eq!(cells[8].bounds.max, DVec2::new(2046.0, 1023.0));
    }

    #[test]
    fn test_non_square_counts_leave_workers_without_cells() {
        let grid = PartitionGrid::new(&world(), 5);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.unassigned_workers(5), 1);
        assert!(PartitionGrid::new(&world(), 3).len() == 1);
    }

    #[test]
    fn test_every_in_bounds_point_in_exactly_one_cell() {
        let cells = partition(&world(), 16);
        let mut y = 0.5;
        while y < 1024.0 {
            let mut x = 0.5;
            while x < 2048.0 {
                let p = DVec2::new(x, y);
                let hits = cells.iter().filter(|c| c.bounds.contains(p)).count();
                assert_eq!(hits, 1, "point {p} hit {hits} cells");
                x += 61.0;
            }
            y += 37.0;
        }
    }

    #[test]
    fn test_boundary_belongs_to_upper_cell() {
        let grid = PartitionGrid::new(&world(), 4);
        let cell = grid.cell_containing(DVec2::new(1024.0, 512.0)).unwrap();
        assert_eq!(cell.worker_index, 3);
        assert!(grid.cell_containing(DVec2::new(2048.0, 0.0)).is_none());
    }

    #[test]
    fn test_offset_bounds() {
        let bounds = Aabb::from_corners(100.0, -50.0, 300.0, 150.0);
        let grid = PartitionGrid::new(&bounds, 4);
        assert_eq!(grid.cells()[0].bounds, Aabb::from_corners(100.0, -50.0, 200.0, 50.0));
        assert_eq!(grid.cell_containing(DVec2::new(250.0, 100.0)).map(|c| c.worker_index), Some(3));
    }
}
