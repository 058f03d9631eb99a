// src/datapoint.rs - One fully resolved scenario instance

use crate::constants::REQUIRED_PARAMETERS;
use crate::error::{Result, VaryError};
use crate::field::Field;
use crate::grid::Grid;
use crate::time_series::TimeSeries;
use glam::DVec3;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Concrete value of one parameter in one datapoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedValue {
    Scalar(f64),
    Vector([f64; 3]),
    Field(Field),
    TimeSeries(TimeSeries),
}

impl ResolvedValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ResolvedValue::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            ResolvedValue::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_time_series(&self) -> Option<&TimeSeries> {
        match self {
            ResolvedValue::TimeSeries(series) => Some(series),
            _ => None,
        }
    }

    /// The value as a dense field over `grid`; scalars are broadcast to every cell.
    pub fn to_field(&self, grid: &Grid) -> Option<Field> {
        match self {
            ResolvedValue::Scalar(value) => Some(Field::uniform(grid, *value)),
            ResolvedValue::Field(field) if field.matches(grid) => Some(field.clone()),
            _ => None,
        }
    }

    /// Whether the value is usable downstream: finite, non-empty, matching the grid.
    fn is_complete(&self, grid: &Grid) -> bool {
        match self {
            ResolvedValue::Scalar(value) => value.is_finite(),
            ResolvedValue::Vector(values) => values.iter().all(|v| v.is_finite()),
            ResolvedValue::Field(field) => {
                field.matches(grid) && field.values().iter().all(|v| v.is_finite())
            }
            ResolvedValue::TimeSeries(series) => {
                !series.is_empty()
                    && series
                        .points
                        .iter()
                        .all(|(t, v)| t.is_finite() && v.is_finite())
            }
        }
    }

    fn summary(&self) -> ValueSummary {
        match self {
            ResolvedValue::Scalar(value) => ValueSummary::Scalar(*value),
            ResolvedValue::Vector(values) => ValueSummary::Vector(*values),
            ResolvedValue::Field(field) => ValueSummary::Field {
                cells: field.cells(),
                min: field.min(),
                max: field.max(),
                blake3: field.digest(),
            },
            ResolvedValue::TimeSeries(series) => ValueSummary::TimeSeries(series.clone()),
        }
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Scalar(value) => write!(f, "{value}"),
            ResolvedValue::Vector([x, y, z]) => write!(f, "[{x}, {y}, {z}]"),
            ResolvedValue::Field(field) => {
                write!(f, "field {:?} in [{:.4e}, {:.4e}]", field.cells(), field.min(), field.max())
            }
            ResolvedValue::TimeSeries(series) => {
                let points: Vec<String> = series
                    .points
                    .iter()
                    .map(|(time, value)| format!("{time}: {value}"))
                    .collect();
                write!(f, "[{}] ({})", points.join(", "), series.time_unit)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatPump {
    pub index: usize,
    pub name: String,
    /// Location in cells.
    pub cell: DVec3,
    /// Location in domain coordinates, at the cell centre.
    pub coordinate: DVec3,
    pub injection_temp: TimeSeries,
    pub injection_rate: TimeSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datapoint {
    pub index: usize,
    pub seed: u64,
    pub grid: Grid,
    pub parameters: BTreeMap<String, ResolvedValue>,
    pub heat_pumps: Vec<HeatPump>,
}

impl Datapoint {
    pub fn get(&self, parameter: &str) -> Option<&ResolvedValue> {
        self.parameters.get(parameter)
    }

    /// Every required parameter present and complete, at least one heat pump.
    ///
    /// Reports the first missing element; nothing is filled in.
    pub fn validate(&self) -> Result<()> {
        for name in REQUIRED_PARAMETERS {
            match self.parameters.get(name) {
                None => {
                    return Err(VaryError::validation(name, "required parameter is missing"));
                }
                Some(value) if !value.is_complete(&self.grid) => {
                    return Err(VaryError::validation(
                        name,
                        "resolved value is incomplete or does not match the grid",
                    ));
                }
                Some(_) => {}
            }
        }
        if self.heat_pumps.is_empty() {
            return Err(VaryError::validation("heat_pumps", "at least one heat pump is required"));
        }
        for pump in &self.heat_pumps {
            if !self.grid.contains(pump.cell) {
                return Err(VaryError::OutOfBounds {
                    pump: pump.name.clone(),
                    location: pump.cell.to_array(),
                    extent: self.grid.cells(),
                });
            }
        }
        Ok(())
    }

    /// Serializable view with dense fields replaced by their digest and range.
    pub fn summary(&self) -> DatapointSummary {
        DatapointSummary {
            index: self.index,
            seed: self.seed,
            cells: self.grid.cells(),
            cell_resolution: self.grid.resolution(),
            parameters: self
                .parameters
                .iter()
                .map(|(name, value)| (name.clone(), value.summary()))
                .collect(),
            heat_pumps: self.heat_pumps.clone(),
        }
    }
}

impl fmt::Display for Datapoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Datapoint #{} (seed {})", self.index, self.seed)?;
        for (name, value) in &self.parameters {
            writeln!(f, "      {name}: {value}")?;
        }
        for pump in &self.heat_pumps {
            writeln!(
                f,
                "      {} at cell [{}, {}, {}]: temp {}, rate {}",
                pump.name,
                pump.cell.x,
                pump.cell.y,
                pump.cell.z,
                ResolvedValue::TimeSeries(pump.injection_temp.clone()),
                ResolvedValue::TimeSeries(pump.injection_rate.clone()),
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSummary {
    Scalar(f64),
    Vector([f64; 3]),
    Field {
        cells: [usize; 3],
        min: f64,
        max: f64,
        blake3: String,
    },
    TimeSeries(TimeSeries),
}

/// What gets written to `datapoint-<index>/datapoint.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatapointSummary {
    pub index: usize,
    pub seed: u64,
    pub cells: [usize; 3],
    pub cell_resolution: f64,
    pub parameters: BTreeMap<String, ValueSummary>,
    pub heat_pumps: Vec<HeatPump>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datapoint(parameters: &[(&str, f64)], pumps: usize) -> Datapoint {
        let grid = Grid::build(&[8, 8, 1], 1.0).unwrap();
        let heat_pumps = (0..pumps)
            .map(|index| {
                let cell = DVec3::new(index as f64, 1.0, 0.0);
                HeatPump {
                    index,
                    name: format!("hp{index}"),
                    cell,
                    coordinate: grid.cell_to_coordinate(cell),
                    injection_temp: TimeSeries::constant(13.6, "year"),
                    injection_rate: TimeSeries::constant(0.00024, "year"),
                }
            })
            .collect();
        Datapoint {
            index: 0,
            seed: 0,
            grid,
            parameters: parameters
                .iter()
                .map(|(name, value)| (name.to_string(), ResolvedValue::Scalar(*value)))
                .collect(),
            heat_pumps,
        }
    }

    #[test]
    fn test_complete_datapoint_is_valid() {
        let dp = datapoint(
            &[("permeability", 5.0), ("pressure_gradient", -0.0025), ("temperature", 10.6)],
            1,
        );
        assert!(dp.validate().is_ok());
    }

    #[test]
    fn test_first_missing_parameter_is_named() {
        let dp = datapoint(&[("permeability", 5.0)], 1);
        let err = dp.validate().unwrap_err();
        assert!(matches!(
            err,
            VaryError::Validation { ref parameter, .. } if parameter == "pressure_gradient"
        ));

        let dp = datapoint(&[("permeability", 5.0), ("pressure_gradient", -0.0025)], 1);
        let err = dp.validate().unwrap_err();
        assert!(matches!(
            err,
            VaryError::Validation { ref parameter, .. } if parameter == "temperature"
        ));
    }

    #[test]
    fn test_missing_heat_pump() {
        let dp = datapoint(
            &[("permeability", 5.0), ("pressure_gradient", -0.0025), ("temperature", 10.6)],
            0,
        );
        let err = dp.validate().unwrap_err();
        assert!(matches!(
            err,
            VaryError::Validation { ref parameter, .. } if parameter == "heat_pumps"
        ));
    }

    #[test]
    fn test_nan_is_not_a_value() {
        let dp = datapoint(
            &[("permeability", f64::NAN), ("pressure_gradient", -0.0025), ("temperature", 10.6)],
            1,
        );
        assert!(dp.validate().is_err());
    }

    #[test]
    fn test_summary_replaces_fields_with_digest() {
        let mut dp = datapoint(
            &[("pressure_gradient", -0.0025), ("temperature", 10.6)],
            1,
        );
        let field = Field::uniform(&dp.grid, 5.0);
        let digest = field.digest();
        dp.parameters.insert("permeability".into(), ResolvedValue::Field(field));

        let json = serde_json::to_value(dp.summary()).unwrap();
        assert_eq!(json["parameters"]["permeability"]["field"]["blake3"], digest);
        assert_eq!(json["parameters"]["temperature"]["scalar"], 10.6);
    }
}
