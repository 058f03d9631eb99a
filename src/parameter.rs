// src/parameter.rs - Declarative description of how each parameter varies

use crate::constants::{
    ABSOLUTE_ZERO_C, DEFAULT_ANISOTROPY, DEFAULT_OCTAVES, INJECTION_TEMP, PERMEABILITY, POROSITY,
    TEMPERATURE,
};
use crate::error::{Result, VaryError};
use crate::field::Field;
use crate::time_series::Schedule;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How values are spread between `min` and `max`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    Uniform,
    Logarithmic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueMinMax {
    pub min: f64,
    pub max: f64,
}

impl ValueMinMax {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, parameter: &str, distribution: Distribution) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(VaryError::invalid_parameter(
                parameter,
                format!("range [{}, {}] is not finite", self.min, self.max),
            ));
        }
        if self.max < self.min {
            return Err(VaryError::invalid_parameter(
                parameter,
                format!("`max` {} is smaller than `min` {}", self.max, self.min),
            ));
        }
        if distribution == Distribution::Logarithmic && self.min <= 0.0 {
            return Err(VaryError::invalid_parameter(
                parameter,
                format!("logarithmic distribution needs a positive `min`, got {}", self.min),
            ));
        }
        Ok(())
    }
}

/// A value that is either given inline or read from a file before resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueOrFile<T> {
    Literal(T),
    FileRef { file: PathBuf },
}

/// Per-axis noise frequency: fixed, or three values drawn per datapoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frequency {
    Fixed(Vec<f64>),
    Range(ValueMinMax),
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Fixed(vec![1.0, 1.0, 1.0])
    }
}

/// Parameters of a `space`-varied field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerlinSpec {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default = "default_anisotropy")]
    pub anisotropy: f64,
    #[serde(default = "default_octaves")]
    pub octaves: u32,
    #[serde(default)]
    pub distribution: Distribution,
}

fn default_anisotropy() -> f64 {
    DEFAULT_ANISOTROPY
}

fn default_octaves() -> u32 {
    DEFAULT_OCTAVES
}

impl PerlinSpec {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            frequency: Frequency::default(),
            anisotropy: DEFAULT_ANISOTROPY,
            octaves: DEFAULT_OCTAVES,
            distribution: Distribution::Uniform,
        }
    }

    pub fn with_anisotropy(mut self, anisotropy: f64) -> Self {
        self.anisotropy = anisotropy;
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn validate(&self, parameter: &str) -> Result<()> {
        ValueMinMax::new(self.min, self.max).validate(parameter, self.distribution)?;
        if !self.anisotropy.is_finite() || self.anisotropy <= 0.0 {
            return Err(VaryError::invalid_parameter(
                parameter,
                format!("anisotropy ratio must be positive, got {}", self.anisotropy),
            ));
        }
        if self.octaves == 0 {
            return Err(VaryError::invalid_parameter(parameter, "octaves must be at least 1"));
        }
        match &self.frequency {
            Frequency::Fixed(values) => {
                if values.len() != 2 && values.len() != 3 {
                    return Err(VaryError::invalid_parameter(
                        parameter,
                        format!("frequency needs 2 or 3 components, got {}", values.len()),
                    ));
                }
                if values.iter().any(|f| !f.is_finite() || *f <= 0.0) {
                    return Err(VaryError::invalid_parameter(
                        parameter,
                        format!("frequency components must be positive, got {values:?}"),
                    ));
                }
            }
            Frequency::Range(range) => {
                range.validate(parameter, Distribution::Uniform)?;
                if range.min <= 0.0 {
                    return Err(VaryError::invalid_parameter(
                        parameter,
                        format!("frequency range must be positive, got {}", range.min),
                    ));
                }
            }
        }
        ValueBounds::for_parameter(parameter).check(parameter, self.min)?;
        ValueBounds::for_parameter(parameter).check(parameter, self.max)
    }
}

/// Values of a `const`-varied parameter across the datapoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstValues {
    List {
        values: Vec<f64>,
    },
    Range {
        min: f64,
        max: f64,
        #[serde(default)]
        distribution: Distribution,
    },
}

/// A `fix` literal once any file reference has been read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FixValue {
    Scalar(f64),
    Vector([f64; 3]),
    Field(Field),
}

/// The closed set of vary methods.
#[derive(Debug, Clone, PartialEq)]
pub enum VaryMethod {
    Fix(FixValue),
    Const(ConstValues),
    Space(PerlinSpec),
    Time { base: f64, schedule: Schedule },
}

impl VaryMethod {
    pub fn label(&self) -> &'static str {
        match self {
            VaryMethod::Fix(_) => "fix",
            VaryMethod::Const(_) => "const",
            VaryMethod::Space(_) => "space",
            VaryMethod::Time { .. } => "time",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariationSpec {
    pub name: String,
    pub method: VaryMethod,
}

impl VariationSpec {
    pub fn new(name: impl Into<String>, method: VaryMethod) -> Self {
        Self {
            name: name.into(),
            method,
        }
    }

    pub fn fix(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, VaryMethod::Fix(FixValue::Scalar(value)))
    }

    pub fn const_range(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self::new(
            name,
            VaryMethod::Const(ConstValues::Range {
                min,
                max,
                distribution: Distribution::Uniform,
            }),
        )
    }

    pub fn space(name: impl Into<String>, spec: PerlinSpec) -> Self {
        Self::new(name, VaryMethod::Space(spec))
    }
}

/// Where a heat pump goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Cell location given verbatim.
    Fixed(DVec3),
    /// Drawn per datapoint by the placement generator.
    Space,
}

/// Injection temperature or rate of a heat pump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InjectionSpec {
    Fixed(f64),
    Varied(InjectionVary),
    Random(ValueMinMax),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vary", rename_all = "lowercase")]
pub enum InjectionVary {
    Const(ConstValues),
    Time { base: f64, schedule: Schedule },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatPumpSpec {
    pub name: String,
    pub placement: Placement,
    pub injection_temp: InjectionSpec,
    pub injection_rate: InjectionSpec,
}

impl HeatPumpSpec {
    pub fn fixed(name: impl Into<String>, cell: [f64; 3], temp: f64, rate: f64) -> Self {
        Self {
            name: name.into(),
            placement: Placement::Fixed(DVec3::from_array(cell)),
            injection_temp: InjectionSpec::Fixed(temp),
            injection_rate: InjectionSpec::Fixed(rate),
        }
    }

    pub fn spatial(name: impl Into<String>, temp: InjectionSpec, rate: InjectionSpec) -> Self {
        Self {
            name: name.into(),
            placement: Placement::Space,
            injection_temp: temp,
            injection_rate: rate,
        }
    }
}

/// Physically valid range of a named quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueBounds {
    /// Exclusive lower limit.
    pub above: Option<f64>,
    /// Inclusive lower limit.
    pub at_least: Option<f64>,
    /// Inclusive upper limit.
    pub at_most: Option<f64>,
}

impl ValueBounds {
    pub const UNBOUNDED: ValueBounds = ValueBounds {
        above: None,
        at_least: None,
        at_most: None,
    };

    pub fn for_parameter(name: &str) -> ValueBounds {
        match name {
            TEMPERATURE | INJECTION_TEMP => ValueBounds {
                above: Some(ABSOLUTE_ZERO_C),
                ..Self::UNBOUNDED
            },
            PERMEABILITY => ValueBounds {
                above: Some(0.0),
                ..Self::UNBOUNDED
            },
            POROSITY => ValueBounds {
                at_least: Some(0.0),
                at_most: Some(1.0),
                ..Self::UNBOUNDED
            },
            _ => Self::UNBOUNDED,
        }
    }

    pub fn check(&self, parameter: &str, value: f64) -> Result<()> {
        let valid = value.is_finite()
            && self.above.is_none_or(|limit| value > limit)
            && self.at_least.is_none_or(|limit| value >= limit)
            && self.at_most.is_none_or(|limit| value <= limit);
        if valid {
            Ok(())
        } else {
            Err(VaryError::invalid_parameter(
                parameter,
                format!("value {value} is outside the physically valid range"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_validation() {
        assert!(ValueMinMax::new(1.0, 2.0).validate("p", Distribution::Uniform).is_ok());
        assert!(ValueMinMax::new(2.0, 2.0).validate("p", Distribution::Uniform).is_ok());
        assert!(ValueMinMax::new(3.0, 2.0).validate("p", Distribution::Uniform).is_err());
        assert!(ValueMinMax::new(0.0, 2.0).validate("p", Distribution::Logarithmic).is_err());
    }

    #[test]
    fn test_perlin_spec_rejects_bad_anisotropy() {
        for anisotropy in [0.0, -1.0, f64::NAN] {
            let spec = PerlinSpec::new(1.0, 10.0).with_anisotropy(anisotropy);
            assert!(matches!(
                spec.validate("permeability"),
                Err(VaryError::InvalidParameter { .. })
            ));
        }
        assert!(PerlinSpec::new(1.0, 10.0).with_anisotropy(4.0).validate("permeability").is_ok());
    }

    #[test]
    fn test_bounds_for_temperature() {
        let bounds = ValueBounds::for_parameter("temperature");
        assert!(bounds.check("temperature", 10.6).is_ok());
        assert!(bounds.check("temperature", -273.15).is_err());
        assert!(bounds.check("temperature", -300.0).is_err());
        assert!(
            ValueBounds::for_parameter("pressure_gradient")
                .check("pressure_gradient", -1.0)
                .is_ok()
        );
        assert!(ValueBounds::for_parameter("porosity").check("porosity", 1.5).is_err());
    }

    #[test]
    fn test_injection_spec_deserialization() {
        let fixed: InjectionSpec = serde_json::from_str("13.6").unwrap();
        assert_eq!(fixed, InjectionSpec::Fixed(13.6));

        let random: InjectionSpec = serde_json::from_str(r#"{"min": 14, "max": 18}"#).unwrap();
        assert_eq!(random, InjectionSpec::Random(ValueMinMax::new(14.0, 18.0)));

        let linear: InjectionSpec =
            serde_json::from_str(r#"{"vary": "const", "min": 0.001, "max": 0.002}"#).unwrap();
        assert!(matches!(
            linear,
            InjectionSpec::Varied(InjectionVary::Const(ConstValues::Range { .. }))
        ));
    }
}
