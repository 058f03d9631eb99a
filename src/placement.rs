//! Heat pump placement.
//!
//! Fixed locations are checked against the domain and each other. Spatial
//! placement draws candidate cells from a seeded stream and rejects every
//! candidate that comes closer than the minimum distance to a pump that is
//! already placed.

use crate::constants::{
    DEFAULT_EDGE_MARGIN, DEFAULT_MIN_PUMP_DISTANCE, MAX_PLACEMENT_ATTEMPTS_PER_PUMP,
};
use crate::error::{Result, VaryError};
use crate::grid::Grid;
use crate::seed::rng_from_seed;
use glam::DVec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacementConfig {
    /// Minimum Euclidean distance between two pumps, in cells.
    pub min_distance: f64,
    /// Cells kept free along the horizontal domain edges.
    pub edge_margin: usize,
    pub max_attempts_per_pump: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            min_distance: DEFAULT_MIN_PUMP_DISTANCE,
            edge_margin: DEFAULT_EDGE_MARGIN,
            max_attempts_per_pump: MAX_PLACEMENT_ATTEMPTS_PER_PUMP,
        }
    }
}

impl PlacementConfig {
    pub fn with_min_distance(mut self, min_distance: f64) -> Self {
        self.min_distance = min_distance;
        self
    }

    pub fn with_edge_margin(mut self, edge_margin: usize) -> Self {
        self.edge_margin = edge_margin;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            return Err(VaryError::invalid_parameter(
                "min_distance",
                format!("must be a non-negative distance, got {}", self.min_distance),
            ));
        }
        if self.max_attempts_per_pump == 0 {
            return Err(VaryError::invalid_parameter(
                "max_attempts_per_pump",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Half-open cell ranges candidates are drawn from, per axis.
    fn candidate_ranges(&self, grid: &Grid) -> Result<[(usize, usize); 3]> {
        let [nx, ny, nz] = grid.cells();
        let margin = self.edge_margin;
        if nx <= 2 * margin || ny <= 2 * margin {
            return Err(VaryError::invalid_parameter(
                "edge_margin",
                format!("margin of {margin} cells leaves no room in a {nx} x {ny} domain"),
            ));
        }
        Ok([(margin, nx - margin), (margin, ny - margin), (0, nz)])
    }

    /// Whether a cell lies inside the domain minus the edge margin.
    pub fn admits(&self, grid: &Grid, cell: DVec3) -> bool {
        let margin = self.edge_margin as f64;
        let extent = grid.extent();
        grid.contains(cell)
            && cell.x >= margin
            && cell.y >= margin
            && cell.x < extent.x - margin
            && cell.y < extent.y - margin
    }
}

/// Check user-supplied locations: every pump inside the grid, no two closer than `min_distance`.
pub fn validate_fixed(grid: &Grid, pumps: &[(String, DVec3)], min_distance: f64) -> Result<()> {
    for (name, cell) in pumps {
        if !grid.contains(*cell) {
            return Err(VaryError::OutOfBounds {
                pump: name.clone(),
                location: cell.to_array(),
                extent: grid.cells(),
            });
        }
    }
    for (a, (first, first_cell)) in pumps.iter().enumerate() {
        for (second, second_cell) in &pumps[a + 1..] {
            let distance = first_cell.distance(*second_cell);
            if distance < min_distance {
                return Err(VaryError::Overlap {
                    first: first.clone(),
                    second: second.clone(),
                    distance,
                    min_distance,
                });
            }
        }
    }
    Ok(())
}

/// Place `count` pumps with the default margin and attempt budget.
pub fn place(grid: &Grid, count: usize, seed: u64, min_distance: f64) -> Result<Vec<DVec3>> {
    let config = PlacementConfig::default().with_min_distance(min_distance);
    place_avoiding(grid, count, seed, &config, &[])
}

/// Place `count` pumps that keep `config.min_distance` to each other and to `existing`.
///
/// Returns exactly `count` cells in draw order, or `PlacementExhausted` once
/// `count * max_attempts_per_pump` candidates have been drawn.
pub fn place_avoiding(
    grid: &Grid,
    count: usize,
    seed: u64,
    config: &PlacementConfig,
    existing: &[DVec3],
) -> Result<Vec<DVec3>> {
    config.validate()?;
    if count == 0 {
        return Ok(Vec::new());
    }
    let ranges = config.candidate_ranges(grid)?;

    let mut rng = rng_from_seed(seed);
    let budget = count.saturating_mul(config.max_attempts_per_pump);
    let mut placed: Vec<DVec3> = Vec::with_capacity(count);
    let mut attempts = 0;

    while placed.len() < count {
        if attempts >= budget {
            return Err(VaryError::PlacementExhausted {
                requested: count,
                placed: placed.len(),
                attempts,
                min_distance: config.min_distance,
            });
        }
        attempts += 1;

        let candidate = DVec3::new(
            rng.random_range(ranges[0].0..ranges[0].1) as f64,
            rng.random_range(ranges[1].0..ranges[1].1) as f64,
            rng.random_range(ranges[2].0..ranges[2].1) as f64,
        );
        let clear = existing
            .iter()
            .chain(placed.iter())
            .all(|other| other.distance(candidate) >= config.min_distance);
        if clear {
            placed.push(candidate);
        }
    }

    debug!(count, attempts, seed, "placed heat pumps");
    Ok(placed)
}
