//! Parameter resolution.
//!
//! Turns each declared variation into the concrete value one datapoint
//! needs. Every generator call gets its own stream seeded from the
//! datapoint seed and the parameter (or heat pump) name, so the result does
//! not depend on the order parameters are resolved in.

use crate::constants::{INJECTION_RATE, INJECTION_TEMP, PRESSURE_GRADIENT};
use crate::datapoint::{HeatPump, ResolvedValue};
use crate::error::{Result, VaryError};
use crate::grid::Grid;
use crate::math_utils::{linear_step, log_step};
use crate::parameter::{
    ConstValues, Distribution, FixValue, HeatPumpSpec, InjectionSpec, InjectionVary, Placement,
    ValueBounds, ValueMinMax, VariationSpec, VaryMethod,
};
use crate::perlin_field;
use crate::placement::{self, PlacementConfig};
use crate::seed::{SeededRng, derive_stream_seed, rng_from_seed};
use crate::time_series::{self, TimeSeries, TimeSpan};
use glam::DVec3;
use rand::Rng;
use tracing::trace;

const PLACEMENT_STREAM: &str = "heat_pump_placement";

/// Everything resolution needs to know about the datapoint being built.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub grid: &'a Grid,
    pub index: usize,
    pub datapoint_count: usize,
    /// Seed of this datapoint, see [`crate::seed::derive_datapoint_seed`].
    pub seed: u64,
    pub horizon: &'a TimeSpan,
}

impl ResolveContext<'_> {
    fn stream(&self, label: &str) -> SeededRng {
        rng_from_seed(self.stream_seed(label))
    }

    fn stream_seed(&self, label: &str) -> u64 {
        derive_stream_seed(self.seed, label)
    }
}

/// Resolve one parameter for the datapoint in `ctx`.
pub fn resolve_parameter(spec: &VariationSpec, ctx: &ResolveContext) -> Result<ResolvedValue> {
    let name = spec.name.as_str();
    let bounds = ValueBounds::for_parameter(name);
    trace!(parameter = name, method = spec.method.label(), index = ctx.index, "resolving");

    match &spec.method {
        VaryMethod::Fix(FixValue::Scalar(value)) => {
            bounds.check(name, *value)?;
            Ok(ResolvedValue::Scalar(*value))
        }
        VaryMethod::Fix(FixValue::Vector(values)) => Ok(ResolvedValue::Vector(*values)),
        VaryMethod::Fix(FixValue::Field(field)) => {
            if !field.matches(ctx.grid) {
                return Err(VaryError::ShapeMismatch {
                    parameter: name.to_string(),
                    expected: ctx.grid.cell_count(),
                    actual: field.len(),
                });
            }
            bounds.check(name, field.min())?;
            bounds.check(name, field.max())?;
            Ok(ResolvedValue::Field(field.clone()))
        }
        VaryMethod::Const(values) => {
            let value = resolve_const(name, values, ctx)?;
            bounds.check(name, value)?;
            Ok(ResolvedValue::Scalar(value))
        }
        VaryMethod::Space(perlin) => {
            let field = perlin_field::generate_with(ctx.grid, ctx.stream_seed(name), perlin, name)?;
            if name == PRESSURE_GRADIENT {
                let pressure = perlin_field::pressure_from_gradient(ctx.grid, &field)?;
                return Ok(ResolvedValue::Field(pressure));
            }
            Ok(ResolvedValue::Field(field))
        }
        VaryMethod::Time { base, schedule } => {
            let series = time_series::build(
                name,
                *base,
                schedule,
                ctx.horizon,
                bounds,
                &mut ctx.stream(name),
            )?;
            Ok(ResolvedValue::TimeSeries(series))
        }
    }
}

/// The value datapoint `ctx.index` takes from a `const` variation.
pub fn resolve_const(name: &str, values: &ConstValues, ctx: &ResolveContext) -> Result<f64> {
    match values {
        ConstValues::List { values } => {
            if values.len() < ctx.datapoint_count {
                return Err(VaryError::invalid_parameter(
                    name,
                    format!(
                        "{} values listed for {} datapoints",
                        values.len(),
                        ctx.datapoint_count
                    ),
                ));
            }
            values.get(ctx.index).copied().ok_or_else(|| {
                VaryError::invalid_parameter(name, format!("no value for datapoint {}", ctx.index))
            })
        }
        ConstValues::Range {
            min,
            max,
            distribution,
        } => {
            ValueMinMax::new(*min, *max).validate(name, *distribution)?;
            Ok(match distribution {
                Distribution::Uniform => linear_step(*min, *max, ctx.index, ctx.datapoint_count),
                Distribution::Logarithmic => log_step(*min, *max, ctx.index, ctx.datapoint_count),
            })
        }
    }
}

/// Place every heat pump and resolve its injection schedules.
///
/// Fixed pumps are checked first, spatial pumps are drawn around them, and
/// only then are injection values resolved, each pump from its own stream.
pub fn resolve_heat_pumps(
    specs: &[HeatPumpSpec],
    config: &PlacementConfig,
    ctx: &ResolveContext,
) -> Result<Vec<HeatPump>> {
    let fixed: Vec<(String, DVec3)> = specs
        .iter()
        .filter_map(|spec| match spec.placement {
            Placement::Fixed(cell) => Some((spec.name.clone(), cell)),
            Placement::Space => None,
        })
        .collect();
    placement::validate_fixed(ctx.grid, &fixed, config.min_distance)?;

    let spatial_count = specs.len() - fixed.len();
    let existing: Vec<DVec3> = fixed.iter().map(|(_, cell)| *cell).collect();
    let mut drawn = placement::place_avoiding(
        ctx.grid,
        spatial_count,
        ctx.stream_seed(PLACEMENT_STREAM),
        config,
        &existing,
    )?
    .into_iter();

    let mut pumps = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let cell = match spec.placement {
            Placement::Fixed(cell) => cell,
            Placement::Space => drawn.next().ok_or_else(|| VaryError::PlacementExhausted {
                requested: spatial_count,
                placed: index,
                attempts: 0,
                min_distance: config.min_distance,
            })?,
        };

        let mut rng = ctx.stream(&format!("heat_pump/{}", spec.name));
        let injection_temp =
            resolve_injection(&spec.name, INJECTION_TEMP, &spec.injection_temp, ctx, &mut rng)?;
        let injection_rate =
            resolve_injection(&spec.name, INJECTION_RATE, &spec.injection_rate, ctx, &mut rng)?;

        pumps.push(HeatPump {
            index,
            name: spec.name.clone(),
            cell,
            coordinate: ctx.grid.cell_to_coordinate(cell),
            injection_temp,
            injection_rate,
        });
    }
    Ok(pumps)
}

fn resolve_injection(
    pump: &str,
    quantity: &str,
    spec: &InjectionSpec,
    ctx: &ResolveContext,
    rng: &mut SeededRng,
) -> Result<TimeSeries> {
    let label = format!("{pump}.{quantity}");
    let bounds = ValueBounds::for_parameter(quantity);
    let unit = ctx.horizon.unit.as_str();

    let constant = match spec {
        InjectionSpec::Fixed(value) => *value,
        InjectionSpec::Random(range) => {
            range.validate(&label, Distribution::Uniform)?;
            range.max - rng.random::<f64>() * (range.max - range.min)
        }
        InjectionSpec::Varied(InjectionVary::Const(values)) => resolve_const(&label, values, ctx)?,
        InjectionSpec::Varied(InjectionVary::Time { base, schedule }) => {
            return time_series::build(&label, *base, schedule, ctx.horizon, bounds, rng);
        }
    };
    bounds.check(&label, constant)?;
    Ok(TimeSeries::constant(constant, unit))
}
