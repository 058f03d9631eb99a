// src/grid.rs - Immutable description of the simulation domain

use crate::error::{Result, VaryError};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Regular domain of cubic cells. `z = 1` is a single-layer (2D) domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    cells: [usize; 3],
    resolution: f64,
    origin: DVec3,
}

impl Grid {
    /// Build a grid from two or three extents (cell counts) and a cell edge length.
    ///
    /// A two dimensional extent gets a third axis of one cell.
    pub fn build(extents: &[i64], resolution: f64) -> Result<Grid> {
        Self::build_with_origin(extents, resolution, DVec3::ZERO)
    }

    pub fn build_with_origin(extents: &[i64], resolution: f64, origin: DVec3) -> Result<Grid> {
        let extents: [i64; 3] = match *extents {
            [x, y] => [x, y, 1],
            [x, y, z] => [x, y, z],
            _ => {
                return Err(VaryError::InvalidGrid(format!(
                    "expected 2 or 3 extents, got {}",
                    extents.len()
                )));
            }
        };
        if let Some(bad) = extents.iter().find(|&&e| e <= 0) {
            return Err(VaryError::InvalidGrid(format!(
                "extent {bad} in {extents:?} must be at least 1"
            )));
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(VaryError::InvalidGrid(format!(
                "cell resolution {resolution} must be positive"
            )));
        }
        if !origin.is_finite() {
            return Err(VaryError::InvalidGrid(format!("origin {origin} is not finite")));
        }

        let cells = extents.map(|e| usize::try_from(e).unwrap_or(usize::MAX));
        let cell_count = cells.iter().try_fold(1usize, |count, &n| count.checked_mul(n));
        if cell_count.is_none() {
            return Err(VaryError::InvalidGrid(format!(
                "{extents:?} has more cells than can be addressed"
            )));
        }

        Ok(Grid {
            cells,
            resolution,
            origin,
        })
    }

    pub fn cells(&self) -> [usize; 3] {
        self.cells
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    pub fn cell_count(&self) -> usize {
        self.cells.iter().product()
    }

    pub fn is_2d(&self) -> bool {
        self.cells[2] == 1
    }

    pub fn max_extent(&self) -> usize {
        self.cells.iter().copied().max().unwrap_or(1)
    }

    /// Linear index of cell `(i, j, k)`, x varies fastest.
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.cells[0] * (j + self.cells[1] * k)
    }

    pub fn cell_of_index(&self, index: usize) -> [usize; 3] {
        let [nx, ny, _] = self.cells;
        [index % nx, (index / nx) % ny, index / (nx * ny)]
    }

    /// Whether a (possibly fractional) cell location lies inside the domain.
    pub fn contains(&self, cell: DVec3) -> bool {
        cell.is_finite()
            && cell.cmpge(DVec3::ZERO).all()
            && cell.cmplt(self.extent()).all()
    }

    /// Extent in cells as a vector.
    pub fn extent(&self) -> DVec3 {
        DVec3::new(
            self.cells[0] as f64,
            self.cells[1] as f64,
            self.cells[2] as f64,
        )
    }

    /// Physical coordinate of a cell location, measured at the cell centre.
    pub fn cell_to_coordinate(&self, cell: DVec3) -> DVec3 {
        self.origin + (cell + DVec3::splat(0.5)) * self.resolution
    }

    /// Physical size of the domain.
    pub fn size(&self) -> DVec3 {
        self.extent() * self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_2d_input_is_normalized() {
        let grid = Grid::build(&[32, 256], 5.0).unwrap();
        assert_eq!(grid.cells(), [32, 256, 1]);
        assert!(grid.is_2d());
        assert_eq!(grid.cell_count(), 32 * 256);
        assert_eq!(grid, Grid::build(&[32, 256, 1], 5.0).unwrap());
    }

    #[test]
    fn test_invalid_extents_and_resolution() {
        assert!(matches!(Grid::build(&[0, 10, 1], 1.0), Err(VaryError::InvalidGrid(_))));
        assert!(matches!(Grid::build(&[4, -1, 1], 1.0), Err(VaryError::InvalidGrid(_))));
        assert!(matches!(Grid::build(&[4], 1.0), Err(VaryError::InvalidGrid(_))));
        assert!(matches!(Grid::build(&[4, 4, 4, 4], 1.0), Err(VaryError::InvalidGrid(_))));
        assert!(matches!(Grid::build(&[4, 4, 4], 0.0), Err(VaryError::InvalidGrid(_))));
        assert!(matches!(Grid::build(&[4, 4, 4], f64::NAN), Err(VaryError::InvalidGrid(_))));
    }

    #[test]
    fn test_cell_count_overflow_is_rejected() {
        assert!(matches!(
            Grid::build(&[i64::MAX, 2, 1], 1.0),
            Err(VaryError::InvalidGrid(_))
        ));
        assert!(matches!(
            Grid::build(&[1 << 32, 1 << 32, 2], 1.0),
            Err(VaryError::InvalidGrid(_))
        ));
        assert!(Grid::build(&[i64::from(u16::MAX), 2, 1], 1.0).is_ok());
    }

    #[test]
    fn test_index_roundtrip() {
        let grid = Grid::build(&[3, 4, 5], 1.0).unwrap();
        for index in 0..grid.cell_count() {
            let [i, j, k] = grid.cell_of_index(index);
            assert_eq!(grid.index(i, j, k), index);
        }
        assert_eq!(grid.index(1, 0, 0), 1);
        assert_eq!(grid.index(0, 1, 0), 3);
        assert_eq!(grid.index(0, 0, 1), 12);
    }

    #[test]
    fn test_contains_and_coordinates() {
        let grid = Grid::build(&[32, 256, 1], 5.0).unwrap();
        assert!(grid.contains(DVec3::new(16.0, 10.0, 0.0)));
        assert!(!grid.contains(DVec3::new(32.0, 10.0, 0.0)));
        assert!(!grid.contains(DVec3::new(16.0, 10.0, 1.0)));
        assert!(!grid.contains(DVec3::new(-0.5, 10.0, 0.0)));

        let coord = grid.cell_to_coordinate(DVec3::new(15.0, 31.0, 0.0));
        assert_abs_diff_eq!(coord.x, 77.5);
        assert_abs_diff_eq!(coord.y, 157.5);
        assert_abs_diff_eq!(coord.z, 2.5);
    }
}
