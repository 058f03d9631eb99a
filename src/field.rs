use crate::error::{Result, VaryError};
use crate::grid::Grid;
use serde::{Deserialize, Serialize};

/// Dense scalar field, one value per grid cell, x varies fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    cells: [usize; 3],
    values: Vec<f64>,
}

impl Field {
    pub fn uniform(grid: &Grid, value: f64) -> Field {
        Field {
            cells: grid.cells(),
            values: vec![value; grid.cell_count()],
        }
    }

    /// Wrap externally supplied values, checking they match the grid.
    pub fn from_values(grid: &Grid, parameter: &str, values: Vec<f64>) -> Result<Field> {
        if values.len() != grid.cell_count() {
            return Err(VaryError::ShapeMismatch {
                parameter: parameter.to_string(),
                expected: grid.cell_count(),
                actual: values.len(),
            });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(VaryError::invalid_parameter(
                parameter,
                format!("field contains non-finite value {bad}"),
            ));
        }
        Ok(Field {
            cells: grid.cells(),
            values,
        })
    }

    pub fn cells(&self) -> [usize; 3] {
        self.cells
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f64> {
        let [nx, ny, nz] = self.cells;
        if i >= nx || j >= ny || k >= nz {
            return None;
        }
        self.values.get(i + nx * (j + ny * k)).copied()
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Whether the field was laid out over a grid of this shape.
    pub fn matches(&self, grid: &Grid) -> bool {
        self.cells == grid.cells()
    }

    /// Stable content digest, used instead of the full value array in datapoint summaries.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for extent in self.cells {
            hasher.update(&(extent as u64).to_le_bytes());
        }
        for value in &self.values {
            hasher.update(&value.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}
