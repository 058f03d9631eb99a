//! Temporal event generator.
//!
//! Turns a schedule into the ordered `(time, value)` control points a
//! simulator consumes as time-dependent boundary conditions. The first
//! control point is always at time zero, times are strictly increasing and
//! never exceed the simulated horizon. No interpolation happens here.

use crate::constants::{
    DEFAULT_FINAL_TIME, DEFAULT_SAMPLES_PER_PERIOD, DEFAULT_TIME_UNIT, MAX_SCHEDULE_POINTS,
};
use crate::error::{Result, VaryError};
use crate::parameter::{ValueBounds, ValueMinMax};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

fn default_time_unit() -> String {
    DEFAULT_TIME_UNIT.to_string()
}

fn default_samples_per_period() -> usize {
    DEFAULT_SAMPLES_PER_PERIOD
}

/// The simulated time horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeSpan {
    #[serde(default = "default_final_time")]
    pub final_time: f64,
    #[serde(default = "default_time_unit")]
    pub unit: String,
}

fn default_final_time() -> f64 {
    DEFAULT_FINAL_TIME
}

impl Default for TimeSpan {
    fn default() -> Self {
        Self {
            final_time: DEFAULT_FINAL_TIME,
            unit: default_time_unit(),
        }
    }
}

impl TimeSpan {
    pub fn new(final_time: f64, unit: impl Into<String>) -> Self {
        Self {
            final_time,
            unit: unit.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.final_time.is_finite() || self.final_time <= 0.0 {
            return Err(VaryError::invalid_parameter(
                "time_to_simulate",
                format!("final time must be positive, got {}", self.final_time),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.final_time, self.unit)
    }
}

/// A breakpoint value, either given or drawn per datapoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleValue {
    Fixed(f64),
    Range(ValueMinMax),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// Explicit `(time, value)` breakpoints. The base value fills in time zero when missing.
    Breakpoints {
        #[serde(default = "default_time_unit")]
        time_unit: String,
        values: Vec<(f64, ScheduleValue)>,
    },
    /// `base + amplitude * sin(2π t / period + phase)`, sampled evenly within each period.
    Seasonal {
        #[serde(default = "default_time_unit")]
        time_unit: String,
        amplitude: f64,
        period: f64,
        #[serde(default)]
        phase: f64,
        #[serde(default = "default_samples_per_period")]
        samples_per_period: usize,
    },
}

impl Schedule {
    pub fn time_unit(&self) -> &str {
        match self {
            Schedule::Breakpoints { time_unit, .. } | Schedule::Seasonal { time_unit, .. } => {
                time_unit
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub time_unit: String,
    pub points: Vec<(f64, f64)>,
}

impl TimeSeries {
    /// A value that never changes: a single control point at time zero.
    pub fn constant(value: f64, time_unit: impl Into<String>) -> Self {
        Self {
            time_unit: time_unit.into(),
            points: vec![(0.0, value)],
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn initial_value(&self) -> Option<f64> {
        self.points.first().map(|&(_, value)| value)
    }
}

/// Build the control points of `schedule` for one datapoint.
///
/// `rng` is only consumed by breakpoints given as ranges.
pub fn build<R: Rng>(
    parameter: &str,
    base_value: f64,
    schedule: &Schedule,
    horizon: &TimeSpan,
    bounds: ValueBounds,
    rng: &mut R,
) -> Result<TimeSeries> {
    horizon.validate()?;
    if schedule.time_unit() != horizon.unit {
        return Err(VaryError::invalid_parameter(
            parameter,
            format!(
                "schedule is given in `{}`, the simulated horizon in `{}`",
                schedule.time_unit(),
                horizon.unit
            ),
        ));
    }

    let points = match schedule {
        Schedule::Breakpoints { values, .. } => {
            breakpoints(parameter, base_value, values, horizon.final_time, rng)?
        }
        Schedule::Seasonal {
            amplitude,
            period,
            phase,
            samples_per_period,
            ..
        } => seasonal(
            parameter,
            base_value,
            *amplitude,
            *period,
            *phase,
            *samples_per_period,
            horizon.final_time,
        )?,
    };

    for &(_, value) in &points {
        bounds.check(parameter, value)?;
    }

    Ok(TimeSeries {
        time_unit: horizon.unit.clone(),
        points,
    })
}

fn breakpoints<R: Rng>(
    parameter: &str,
    base_value: f64,
    values: &[(f64, ScheduleValue)],
    horizon: f64,
    rng: &mut R,
) -> Result<Vec<(f64, f64)>> {
    let mut sorted: Vec<(f64, ScheduleValue)> = values.to_vec();
    if let Some((time, _)) = sorted
        .iter()
        .find(|(t, _)| !t.is_finite() || *t < 0.0 || *t > horizon)
    {
        return Err(VaryError::invalid_parameter(
            parameter,
            format!("breakpoint time {time} lies outside [0, {horizon}]"),
        ));
    }
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(VaryError::invalid_parameter(
            parameter,
            format!("breakpoint time {} appears twice", pair[0].0),
        ));
    }

    let mut points = Vec::with_capacity(sorted.len() + 1);
    if sorted.first().is_none_or(|(time, _)| *time > 0.0) {
        points.push((0.0, base_value));
    }
    for (time, value) in sorted {
        let value = match value {
            ScheduleValue::Fixed(value) => value,
            ScheduleValue::Range(range) => {
                range.validate(parameter, Default::default())?;
                range.max - rng.random::<f64>() * (range.max - range.min)
            }
        };
        points.push((time, value));
    }
    Ok(points)
}

fn seasonal(
    parameter: &str,
    base_value: f64,
    amplitude: f64,
    period: f64,
    phase: f64,
    samples_per_period: usize,
    horizon: f64,
) -> Result<Vec<(f64, f64)>> {
    if !period.is_finite() || period <= 0.0 {
        return Err(VaryError::invalid_parameter(
            parameter,
            format!("period must be positive, got {period}"),
        ));
    }
    if samples_per_period == 0 {
        return Err(VaryError::invalid_parameter(
            parameter,
            "samples_per_period must be at least 1",
        ));
    }
    if !amplitude.is_finite() || !phase.is_finite() {
        return Err(VaryError::invalid_parameter(
            parameter,
            "amplitude and phase must be finite",
        ));
    }

    let step = period / samples_per_period as f64;
    let steps = horizon / step + 1e-9;
    if !steps.is_finite() || steps >= MAX_SCHEDULE_POINTS as f64 {
        return Err(VaryError::invalid_parameter(
            parameter,
            format!(
                "period {period} with {samples_per_period} samples would need at least \
                 {MAX_SCHEDULE_POINTS} control points over {horizon}"
            ),
        ));
    }
    let steps = steps.floor() as usize;
    let points = (0..=steps)
        .map(|k| {
            let time = (k as f64 * step).min(horizon);
            let value = base_value + amplitude * (TAU * time / period + phase).sin();
            (time, value)
        })
        .collect();
    Ok(points)
}
