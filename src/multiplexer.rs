// src/multiplexer.rs - Expands one scenario into N reproducible datapoints

use crate::datapoint::{Datapoint, ResolvedValue};
use crate::error::{Result, VaryError};
use crate::grid::Grid;
use crate::parameter::{HeatPumpSpec, VariationSpec};
use crate::placement::PlacementConfig;
use crate::resolve::{ResolveContext, resolve_heat_pumps, resolve_parameter};
use crate::seed::{derive_datapoint_seed, derive_stream_seed, rng_from_seed};
use crate::time_series::{TimeSeries, TimeSpan};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Everything needed to build datapoints, with file references already read.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub grid: Grid,
    pub parameters: Vec<VariationSpec>,
    pub heat_pumps: Vec<HeatPumpSpec>,
    pub placement: PlacementConfig,
    pub horizon: TimeSpan,
    /// Permute each parameter's values across datapoints after expansion.
    pub shuffle: bool,
    pub parallel: bool,
}

impl Scenario {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            parameters: Vec::new(),
            heat_pumps: Vec::new(),
            placement: PlacementConfig::default(),
            horizon: TimeSpan::default(),
            shuffle: false,
            parallel: false,
        }
    }

    pub fn with_parameter(mut self, spec: VariationSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn with_heat_pump(mut self, spec: HeatPumpSpec) -> Self {
        self.heat_pumps.push(spec);
        self
    }

    pub fn with_placement(mut self, placement: PlacementConfig) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_horizon(mut self, horizon: TimeSpan) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn shuffled(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn in_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checks that do not depend on a datapoint: unique names, horizon, placement config.
    pub fn validate(&self) -> Result<()> {
        self.horizon.validate()?;
        self.placement.validate()?;

        let mut seen = HashSet::new();
        for spec in &self.parameters {
            if !seen.insert(spec.name.as_str()) {
                return Err(VaryError::invalid_parameter(
                    &spec.name,
                    "declared more than once",
                ));
            }
        }
        let mut seen = HashSet::new();
        for pump in &self.heat_pumps {
            if !seen.insert(pump.name.as_str()) {
                return Err(VaryError::invalid_parameter(
                    &pump.name,
                    "heat pump name used more than once",
                ));
            }
        }
        Ok(())
    }
}

/// Build `datapoint_count` datapoints, index ordered `0..datapoint_count`.
///
/// Each datapoint is resolved from its own derived seed and validated on its
/// own. The first failing datapoint (by index, also when running in
/// parallel) aborts the expansion and no datapoints are returned.
pub fn expand(
    scenario: &Scenario,
    datapoint_count: usize,
    global_seed: u64,
) -> Result<Vec<Datapoint>> {
    if datapoint_count == 0 {
        return Err(VaryError::invalid_parameter(
            "number_datapoints",
            "at least one datapoint is required",
        ));
    }
    scenario.validate()?;

    let build = |index: usize| build_datapoint(scenario, index, datapoint_count, global_seed);
    let mut datapoints = collect_datapoints(datapoint_count, scenario.parallel, build)?;

    if scenario.shuffle {
        shuffle_datapoints(&mut datapoints, global_seed);
    }

    info!(
        datapoints = datapoints.len(),
        parameters = scenario.parameters.len(),
        heat_pumps = scenario.heat_pumps.len(),
        parallel = scenario.parallel,
        "expanded scenario"
    );
    Ok(datapoints)
}

/// Build indices `0..count` in order, stopping at the first failure.
///
/// Rayon stops scheduling work once any index fails but the error it hands
/// back is not necessarily the lowest one, so the indices below it are
/// rebuilt one by one to report the first failing datapoint.
fn collect_datapoints<F>(count: usize, parallel: bool, build: F) -> Result<Vec<Datapoint>>
where
    F: Fn(usize) -> Result<Datapoint> + Sync + Send,
{
    if !parallel {
        return (0..count).map(&build).collect();
    }

    match (0..count).into_par_iter().map(&build).collect::<Result<Vec<_>>>() {
        Ok(datapoints) => Ok(datapoints),
        Err(e) => {
            let failed = e.datapoint_index().unwrap_or(0);
            match (0..failed).map(&build).find_map(|result| result.err()) {
                Some(first) => Err(first),
                None => Err(e),
            }
        }
    }
}

/// Resolve and validate datapoint `index` on its own.
pub fn build_datapoint(
    scenario: &Scenario,
    index: usize,
    datapoint_count: usize,
    global_seed: u64,
) -> Result<Datapoint> {
    let seed = derive_datapoint_seed(global_seed, index);
    let ctx = ResolveContext {
        grid: &scenario.grid,
        index,
        datapoint_count,
        seed,
        horizon: &scenario.horizon,
    };

    let inner = || -> Result<Datapoint> {
        let parameters = scenario
            .parameters
            .iter()
            .map(|spec| Ok((spec.name.clone(), resolve_parameter(spec, &ctx)?)))
            .collect::<Result<BTreeMap<String, ResolvedValue>>>()?;
        let heat_pumps = resolve_heat_pumps(&scenario.heat_pumps, &scenario.placement, &ctx)?;

        let datapoint = Datapoint {
            index,
            seed,
            grid: scenario.grid.clone(),
            parameters,
            heat_pumps,
        };
        datapoint.validate()?;
        Ok(datapoint)
    };

    let datapoint = inner().map_err(|e| e.in_datapoint(index))?;
    debug!(index, seed, "built datapoint");
    Ok(datapoint)
}

/// Permute the values of every parameter across datapoints.
///
/// Each parameter gets its own permutation so that parameters varied over
/// the same index range stop moving in lockstep. Heat pumps keep their
/// location; their injection series move together under a permutation keyed
/// by the pump name.
fn shuffle_datapoints(datapoints: &mut [Datapoint], global_seed: u64) {
    let Some(first) = datapoints.first() else {
        return;
    };
    let names: Vec<String> = first.parameters.keys().cloned().collect();
    let pumps: Vec<String> = first.heat_pumps.iter().map(|hp| hp.name.clone()).collect();

    for name in names {
        let order = permutation(datapoints.len(), global_seed, &format!("shuffle/{name}"));
        let mut values: Vec<Option<ResolvedValue>> = datapoints
            .iter_mut()
            .map(|dp| dp.parameters.remove(&name))
            .collect();
        for (dp, from) in datapoints.iter_mut().zip(order) {
            if let Some(value) = values[from].take() {
                dp.parameters.insert(name.clone(), value);
            }
        }
    }

    for (slot, pump) in pumps.iter().enumerate() {
        let stream = format!("shuffle/heat_pump/{pump}");
        let order = permutation(datapoints.len(), global_seed, &stream);
        let injections: Vec<(TimeSeries, TimeSeries)> = datapoints
            .iter()
            .map(|dp| {
                let hp = &dp.heat_pumps[slot];
                (hp.injection_temp.clone(), hp.injection_rate.clone())
            })
            .collect();
        for (dp, from) in datapoints.iter_mut().zip(order) {
            let (temp, rate) = injections[from].clone();
            let hp = &mut dp.heat_pumps[slot];
            hp.injection_temp = temp;
            hp.injection_rate = rate;
        }
    }
}

fn permutation(len: usize, global_seed: u64, stream: &str) -> Vec<usize> {
    let mut rng = rng_from_seed(derive_stream_seed(global_seed, stream));
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(&mut rng);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{
        ConstValues, Distribution, InjectionSpec, InjectionVary, PerlinSpec, VaryMethod,
    };
    use more_asserts::assert_le;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn base_scenario() -> Scenario {
        Scenario::new(Grid::build(&[32, 256, 1], 5.0).unwrap())
            .with_parameter(VariationSpec::fix("permeability", 5.0))
            .with_parameter(VariationSpec::fix("pressure_gradient", -0.0025))
            .with_parameter(VariationSpec::fix("temperature", 10.6))
            .with_heat_pump(HeatPumpSpec::fixed("hp1", [16.0, 10.0, 0.0], 13.6, 0.00024))
    }

    #[test]
    fn test_zero_datapoints_fails() {
        assert!(matches!(
            expand(&base_scenario(), 0, 0),
            Err(VaryError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_duplicate_parameter_fails() {
        let scenario = base_scenario().with_parameter(VariationSpec::fix("temperature", 11.0));
        assert!(expand(&scenario, 1, 0).is_err());
    }

    #[test]
    fn test_missing_required_parameter_reports_index() {
        let mut scenario = base_scenario();
        scenario.parameters.retain(|spec| spec.name != "temperature");
        let err = expand(&scenario, 3, 0).unwrap_err();
        assert_eq!(err.datapoint_index(), Some(0));
        assert!(matches!(
            err.root(),
            VaryError::Validation { parameter, .. } if parameter == "temperature"
        ));
    }

    #[test]
    fn test_sequential_expansion_stops_at_first_failure() {
        let calls = AtomicUsize::new(0);
        let err = collect_datapoints(20, false, |index| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(VaryError::validation("temperature", "missing").in_datapoint(index))
        })
        .unwrap_err();
        assert_eq!(err.datapoint_index(), Some(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parallel_expansion_reports_lowest_failing_index() {
        let scenario = base_scenario();
        let calls = AtomicUsize::new(0);
        let err = collect_datapoints(64, true, |index| {
            calls.fetch_add(1, Ordering::SeqCst);
            if index >= 5 {
                Err(VaryError::validation("temperature", "missing").in_datapoint(index))
            } else {
                build_datapoint(&scenario, index, 64, 0)
            }
        })
        .unwrap_err();
        assert_eq!(err.datapoint_index(), Some(5));
        assert_le!(calls.load(Ordering::SeqCst), 64 + 5);
    }

    #[test]
    fn test_failing_scenario_fails_fast() {
        let mut scenario = base_scenario();
        scenario.parameters.retain(|spec| spec.name != "temperature");
        for parallel in [false, true] {
            let err = expand(&scenario.clone().in_parallel(parallel), 50, 0).unwrap_err();
            assert_eq!(err.datapoint_index(), Some(0));
        }
    }

    #[test]
    fn test_shuffle_permutes_values_only() {
        let scenario = base_scenario()
            .with_parameter(VariationSpec::new(
                "porosity",
                VaryMethod::Const(ConstValues::List {
                    values: (0..8).map(|i| 0.1 + 0.05 * i as f64).collect(),
                }),
            ))
            .shuffled(true);
        let plain = expand(&scenario.clone().shuffled(false), 8, 3).unwrap();
        let shuffled = expand(&scenario, 8, 3).unwrap();

        let porosity = |dp: &Datapoint| dp.get("porosity").unwrap().as_scalar().unwrap();
        let mut before: Vec<f64> = plain.iter().map(porosity).collect();
        let mut after: Vec<f64> = shuffled.iter().map(porosity).collect();
        assert_ne!(before, after);
        before.sort_by(f64::total_cmp);
        after.sort_by(f64::total_cmp);
        assert_eq!(before, after);

        for (a, b) in plain.iter().zip(&shuffled) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.seed, b.seed);
        }
    }

    #[test]
    fn test_shuffle_moves_const_injection_with_the_pump() {
        let mut scenario =
            base_scenario().with_parameter(VariationSpec::const_range("porosity", 0.1, 0.8));
        scenario.heat_pumps[0].injection_temp =
            InjectionSpec::Varied(InjectionVary::Const(ConstValues::Range {
                min: 10.0,
                max: 17.0,
                distribution: Distribution::Uniform,
            }));
        let plain = expand(&scenario, 8, 11).unwrap();
        let shuffled = expand(&scenario.clone().shuffled(true), 8, 11).unwrap();

        let temps = |dps: &[Datapoint]| -> Vec<f64> {
            dps.iter()
                .map(|dp| dp.heat_pumps[0].injection_temp.initial_value().unwrap())
                .collect()
        };
        let porosity = |dps: &[Datapoint]| -> Vec<f64> {
            dps.iter()
                .map(|dp| dp.get("porosity").unwrap().as_scalar().unwrap())
                .collect()
        };

        let (mut before, mut after) = (temps(&plain), temps(&shuffled));
        assert_ne!(before, after);
        // no longer in lockstep with the const-ranged porosity
        let lockstep = |dps: &[Datapoint]| {
            temps(dps)
                .iter()
                .zip(porosity(dps))
                .all(|(t, p)| ((t - 10.0) - (p - 0.1) * 10.0).abs() < 1e-9)
        };
        assert!(lockstep(&plain));
        assert!(!lockstep(&shuffled));

        before.sort_by(f64::total_cmp);
        after.sort_by(f64::total_cmp);
        assert_eq!(before, after);
        for (a, b) in plain.iter().zip(&shuffled) {
            assert_eq!(a.heat_pumps[0].cell, b.heat_pumps[0].cell);
        }
    }

    #[test]
    fn test_space_fields_differ_between_datapoints() {
        let mut scenario = base_scenario();
        scenario.grid = Grid::build(&[16, 16, 1], 5.0).unwrap();
        scenario.parameters[0] = VariationSpec::space("permeability", PerlinSpec::new(1e-11, 1e-9));
        scenario.heat_pumps[0] = HeatPumpSpec::fixed("hp1", [8.0, 8.0, 0.0], 13.6, 0.00024);

        let datapoints = expand(&scenario, 2, 0).unwrap();
        assert_ne!(
            datapoints[0].get("permeability"),
            datapoints[1].get("permeability")
        );
    }
}
