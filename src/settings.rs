//! Run settings.
//!
//! A settings file (TOML or JSON) holds three sections: `general`,
//! `hydrogeological_parameters` and `heatpump_parameters`. User settings are
//! laid over a table of defaults: hydrogeological parameters are merged key
//! by key, a user heat pump section replaces the default heat pump and the
//! user `general` section replaces the default one.
//!
//! ```toml
//! [general]
//! number_cells = [32, 256, 1]
//! number_datapoints = 4
//!
//! [hydrogeological_parameters.permeability]
//! vary = "space"
//! min = 1e-11
//! max = 1e-9
//! distribution = "logarithmic"
//!
//! [heatpump_parameters.hp1]
//! vary = "fix"
//! location = [16, 10, 0]
//! injection_temp = 13.6
//! injection_rate = 0.00024
//! ```

use crate::constants::*;
use crate::error::{Result, VaryError};
use crate::file_ref::{FileLoader, FileValue};
use crate::grid::Grid;
use crate::multiplexer::Scenario;
use crate::parameter::{
    ConstValues, Distribution, FixValue, HeatPumpSpec, InjectionSpec, Placement, PerlinSpec,
    ValueOrFile, VariationSpec, VaryMethod,
};
use crate::placement::{self, PlacementConfig};
use crate::time_series::{Schedule, TimeSpan};
use glam::DVec3;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    /// Two or three cell counts; a missing third axis is one cell.
    pub number_cells: Vec<i64>,
    /// Edge length of the cubic cells.
    pub cell_resolution: f64,
    /// `null` draws a fresh seed from OS entropy.
    pub random_seed: Option<u64>,
    pub number_datapoints: usize,
    pub time_to_simulate: TimeSpan,
    pub shuffle_datapoints: bool,
    pub parallel: bool,
    pub interactive: bool,
    pub profiling: bool,
    pub output_directory: PathBuf,
    pub placement: PlacementConfig,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            number_cells: DEFAULT_NUMBER_CELLS.iter().map(|&n| n as i64).collect(),
            cell_resolution: DEFAULT_CELL_RESOLUTION,
            random_seed: Some(DEFAULT_RANDOM_SEED),
            number_datapoints: DEFAULT_NUMBER_DATAPOINTS,
            time_to_simulate: TimeSpan::default(),
            shuffle_datapoints: false,
            parallel: false,
            interactive: true,
            profiling: false,
            output_directory: PathBuf::from("datasets_out"),
            placement: PlacementConfig::default(),
        }
    }
}

impl GeneralConfig {
    /// The configured seed, or one drawn from entropy for `null`.
    pub fn resolve_seed(&self) -> u64 {
        match self.random_seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random::<u64>();
                info!(seed, "no random seed configured, drawn one from entropy");
                seed
            }
        }
    }
}

/// A `fix` value as written in a settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixLiteral {
    Scalar(f64),
    Vector(Vec<f64>),
}

/// A `const` value as written in a settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstSetting {
    List {
        values: ValueOrFile<Vec<f64>>,
    },
    Range {
        min: f64,
        max: f64,
        #[serde(default)]
        distribution: Distribution,
    },
}

/// One entry of `hydrogeological_parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vary", rename_all = "lowercase")]
pub enum ParameterSetting {
    Fix { value: ValueOrFile<FixLiteral> },
    Const(ConstSetting),
    Space(PerlinSpec),
    Time { base: f64, schedule: Schedule },
}

impl ParameterSetting {
    pub fn fix(value: f64) -> Self {
        ParameterSetting::Fix {
            value: ValueOrFile::Literal(FixLiteral::Scalar(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementMode {
    Fix,
    Space,
}

/// One entry of `heatpump_parameters`: a single pump or a group of `number` pumps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeatPumpSetting {
    Group(HeatPumpGroup),
    Single(SingleHeatPump),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeatPumpGroup {
    pub number: usize,
    pub injection_temp: InjectionSpec,
    pub injection_rate: InjectionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SingleHeatPump {
    pub vary: PlacementMode,
    /// Cell location, required for `fix` and left out for `space`.
    #[serde(default)]
    pub location: Option<Vec<f64>>,
    pub injection_temp: InjectionSpec,
    pub injection_rate: InjectionSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub general: GeneralConfig,
    pub hydrogeological_parameters: BTreeMap<String, ParameterSetting>,
    pub heatpump_parameters: BTreeMap<String, HeatPumpSetting>,
}

static DEFAULT_SETTINGS: Lazy<Settings> = Lazy::new(|| {
    let hydrogeological_parameters = [
        (PERMEABILITY, DEFAULT_PERMEABILITY),
        (PRESSURE_GRADIENT, DEFAULT_PRESSURE_GRADIENT),
        (TEMPERATURE, DEFAULT_TEMPERATURE_C),
        (POROSITY, DEFAULT_POROSITY),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), ParameterSetting::fix(value)))
    .collect();

    let mut heatpump_parameters = BTreeMap::new();
    heatpump_parameters.insert(
        DEFAULT_HEATPUMP_NAME.to_string(),
        HeatPumpSetting::Single(SingleHeatPump {
            vary: PlacementMode::Fix,
            location: Some(DEFAULT_HEATPUMP_CELL.to_vec()),
            injection_temp: InjectionSpec::Fixed(DEFAULT_INJECTION_TEMP_C),
            injection_rate: InjectionSpec::Fixed(DEFAULT_INJECTION_RATE_M3_S),
        }),
    );

    Settings {
        general: GeneralConfig::default(),
        hydrogeological_parameters,
        heatpump_parameters,
    }
});

impl Settings {
    /// The built-in defaults: every required parameter `fix`ed and one heat pump.
    pub fn defaults() -> Settings {
        DEFAULT_SETTINGS.clone()
    }

    /// Lay `user` over `self`.
    pub fn override_with(&mut self, user: Settings) {
        self.general = user.general;
        self.hydrogeological_parameters
            .extend(user.hydrogeological_parameters);
        if !user.heatpump_parameters.is_empty() {
            self.heatpump_parameters = user.heatpump_parameters;
        }
    }

    /// Parse a settings file, TOML unless the extension is `.json`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Settings> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| VaryError::io(path, e))?;
        let settings = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            _ => Self::from_toml_str(&text)?,
        };
        debug!(path = %path.display(), "parsed settings file");
        Ok(settings)
    }

    pub fn from_toml_str(text: &str) -> Result<Settings> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Settings> {
        Ok(serde_json::from_str(text)?)
    }

    /// Defaults overridden with the settings file at `path`, if any.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let mut settings = Self::defaults();
        if let Some(path) = path {
            settings.override_with(Self::from_path(path)?);
        }
        Ok(settings)
    }

    pub fn grid(&self) -> Result<Grid> {
        Grid::build(&self.general.number_cells, self.general.cell_resolution)
    }

    /// Read every file reference, expand heat pump groups and build the scenario.
    ///
    /// Relative file references are resolved against `base_dir`.
    pub fn prepare(&self, base_dir: Option<&Path>) -> Result<Scenario> {
        let grid = self.grid()?;
        let general = &self.general;
        general.time_to_simulate.validate()?;

        let parameters = self
            .hydrogeological_parameters
            .iter()
            .map(|(name, setting)| prepare_parameter(name, setting, &grid, base_dir))
            .collect::<Result<Vec<_>>>()?;
        let heat_pumps = self.prepare_heat_pumps(&grid)?;

        Ok(Scenario {
            grid,
            parameters,
            heat_pumps,
            placement: general.placement.clone(),
            horizon: general.time_to_simulate.clone(),
            shuffle: general.shuffle_datapoints,
            parallel: general.parallel,
        })
    }

    fn prepare_heat_pumps(&self, grid: &Grid) -> Result<Vec<HeatPumpSpec>> {
        let mut pumps = Vec::new();
        for (name, setting) in &self.heatpump_parameters {
            let HeatPumpSetting::Single(single) = setting else {
                continue;
            };
            let placement = match (single.vary, &single.location) {
                (PlacementMode::Fix, Some(location)) => {
                    Placement::Fixed(location_to_cell(name, location)?)
                }
                (PlacementMode::Fix, None) => {
                    return Err(VaryError::invalid_parameter(
                        name,
                        "a `fix` heat pump needs a location",
                    ));
                }
                (PlacementMode::Space, None) => Placement::Space,
                (PlacementMode::Space, Some(_)) => {
                    return Err(VaryError::invalid_parameter(
                        name,
                        "a `space` heat pump gets its location drawn, leave `location` out",
                    ));
                }
            };
            pumps.push(HeatPumpSpec {
                name: name.clone(),
                placement,
                injection_temp: single.injection_temp.clone(),
                injection_rate: single.injection_rate.clone(),
            });
        }

        let fixed: Vec<(String, DVec3)> = pumps
            .iter()
            .filter_map(|pump| match pump.placement {
                Placement::Fixed(cell) => Some((pump.name.clone(), cell)),
                Placement::Space => None,
            })
            .collect();
        placement::validate_fixed(grid, &fixed, self.general.placement.min_distance)?;

        let mut names: BTreeSet<String> = pumps.iter().map(|pump| pump.name.clone()).collect();
        for (group, setting) in &self.heatpump_parameters {
            let HeatPumpSetting::Group(spec) = setting else {
                continue;
            };
            if spec.number == 0 {
                return Err(VaryError::invalid_parameter(group, "`number` must be at least 1"));
            }
            for i in 0..spec.number {
                let name = format!("{group}_{i}");
                if !names.insert(name.clone()) {
                    return Err(VaryError::invalid_parameter(
                        &name,
                        format!("generated heat pump name of group `{group}` is already taken"),
                    ));
                }
                pumps.push(HeatPumpSpec::spatial(
                    name,
                    spec.injection_temp.clone(),
                    spec.injection_rate.clone(),
                ));
            }
            debug!(group, number = spec.number, "expanded heat pump group");
        }
        Ok(pumps)
    }
}

fn prepare_parameter(
    name: &str,
    setting: &ParameterSetting,
    grid: &Grid,
    base_dir: Option<&Path>,
) -> Result<VariationSpec> {
    let method = match setting {
        ParameterSetting::Fix { value } => VaryMethod::Fix(match value {
            ValueOrFile::Literal(FixLiteral::Scalar(value)) => FixValue::Scalar(*value),
            ValueOrFile::Literal(FixLiteral::Vector(values)) => {
                FixValue::Vector(pad_to_3d(name, values)?)
            }
            ValueOrFile::FileRef { file } => {
                match FileLoader::load(FileLoader::resolve_path(file, base_dir))? {
                    FileValue::Scalar(value) => FixValue::Scalar(value),
                    list => FixValue::Field(list.into_field(grid, name)?),
                }
            }
        }),
        ParameterSetting::Const(ConstSetting::List { values }) => {
            let values = match values {
                ValueOrFile::Literal(values) => values.clone(),
                ValueOrFile::FileRef { file } => {
                    FileLoader::load(FileLoader::resolve_path(file, base_dir))?.into_list()
                }
            };
            VaryMethod::Const(ConstValues::List { values })
        }
        ParameterSetting::Const(ConstSetting::Range {
            min,
            max,
            distribution,
        }) => VaryMethod::Const(ConstValues::Range {
            min: *min,
            max: *max,
            distribution: *distribution,
        }),
        ParameterSetting::Space(spec) => {
            spec.validate(name)?;
            VaryMethod::Space(spec.clone())
        }
        ParameterSetting::Time { base, schedule } => VaryMethod::Time {
            base: *base,
            schedule: schedule.clone(),
        },
    };
    Ok(VariationSpec::new(name, method))
}

/// Two components get a third of zero.
fn pad_to_3d(name: &str, values: &[f64]) -> Result<[f64; 3]> {
    match *values {
        [x, y] => Ok([x, y, 0.0]),
        [x, y, z] => Ok([x, y, z]),
        _ => Err(VaryError::invalid_parameter(
            name,
            format!("expected 2 or 3 components, got {}", values.len()),
        )),
    }
}

fn location_to_cell(name: &str, location: &[f64]) -> Result<DVec3> {
    Ok(DVec3::from_array(pad_to_3d(name, location)?))
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let general = &self.general;
        writeln!(f, "=== General")?;
        writeln!(f, "    Number of cells: {:?}", general.number_cells)?;
        writeln!(f, "    Cell resolution: {}", general.cell_resolution)?;
        match general.random_seed {
            Some(seed) => writeln!(f, "    Random seed: {seed}")?,
            None => writeln!(f, "    Random seed: from entropy")?,
        }
        writeln!(f, "    Number of datapoints: {}", general.number_datapoints)?;
        writeln!(f, "    Time to simulate: {}", general.time_to_simulate)?;
        writeln!(f, "    Output directory: {}", general.output_directory.display())?;
        writeln!(f, "=== Parameters")?;
        for (name, setting) in &self.hydrogeological_parameters {
            let vary = match setting {
                ParameterSetting::Fix { .. } => "fix",
                ParameterSetting::Const(_) => "const",
                ParameterSetting::Space(_) => "space",
                ParameterSetting::Time { .. } => "time",
            };
            writeln!(f, "    {name}: {vary}")?;
        }
        writeln!(f, "=== Heat pumps")?;
        for (name, setting) in &self.heatpump_parameters {
            match setting {
                HeatPumpSetting::Group(group) => {
                    writeln!(f, "    {name}: group of {}", group.number)?
                }
                HeatPumpSetting::Single(single) => match &single.location {
                    Some(location) => writeln!(f, "    {name}: at {location:?}")?,
                    None => writeln!(f, "    {name}: placed randomly")?,
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_cover_required_parameters() {
        let settings = Settings::defaults();
        for name in REQUIRED_PARAMETERS {
            assert!(settings.hydrogeological_parameters.contains_key(name));
        }
        let scenario = settings.prepare(None).unwrap();
        assert_eq!(scenario.grid.cells(), [32, 256, 1]);
        assert_eq!(scenario.heat_pumps.len(), 1);
        assert_eq!(
            scenario.heat_pumps[0].placement,
            Placement::Fixed(DVec3::new(16.0, 32.0, 0.0))
        );
    }

    #[test]
    fn test_override_merges_parameters_and_replaces_pumps() {
        let user = Settings::from_toml_str(
            r#"
            [general]
            number_datapoints = 3

            [hydrogeological_parameters.permeability]
            vary = "const"
            min = 1e-11
            max = 1e-9

            [heatpump_parameters.hp_a]
            vary = "space"
            injection_temp = 14.0
            injection_rate = 0.0002
            "#,
        )
        .unwrap();

        let mut settings = Settings::defaults();
        settings.override_with(user);

        assert_eq!(settings.general.number_datapoints, 3);
        assert_eq!(settings.general.random_seed, Some(0));
        assert_eq!(settings.hydrogeological_parameters.len(), 4);
        assert!(matches!(
            settings.hydrogeological_parameters["permeability"],
            ParameterSetting::Const(ConstSetting::Range { .. })
        ));
        assert_eq!(settings.heatpump_parameters.len(), 1);
        assert!(settings.heatpump_parameters.contains_key("hp_a"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = Settings::from_toml_str(
            r#"
            [general]
            number_of_cells = [1, 2, 3]
            "#,
        );
        assert!(matches!(result, Err(VaryError::Toml(_))));
    }

    #[test]
    fn test_null_seed_in_json() {
        let settings = Settings::from_json_str(r#"{"general": {"random_seed": null}}"#).unwrap();
        assert_eq!(settings.general.random_seed, None);
    }

    #[test]
    fn test_heat_pump_groups_expand_after_explicit_pumps() {
        let mut settings = Settings::defaults();
        settings.override_with(
            Settings::from_toml_str(
                r#"
                [heatpump_parameters.hp1]
                vary = "fix"
                location = [16, 10]
                injection_temp = 13.6
                injection_rate = 0.00024

                [heatpump_parameters.field]
                number = 3
                injection_temp = { min = 14, max = 18 }
                injection_rate = { vary = "const", values = [0.001, 0.002] }
                "#,
            )
            .unwrap(),
        );

        let pumps = settings.prepare(None).unwrap().heat_pumps;
        let names: Vec<&str> = pumps.iter().map(|pump| pump.name.as_str()).collect();
        assert_eq!(names, ["hp1", "field_0", "field_1", "field_2"]);
        assert_eq!(pumps[0].placement, Placement::Fixed(DVec3::new(16.0, 10.0, 0.0)));
        assert!(pumps[1..].iter().all(|pump| pump.placement == Placement::Space));
    }

    #[test]
    fn test_group_name_clash() {
        let mut settings = Settings::defaults();
        settings.override_with(
            Settings::from_toml_str(
                r#"
                [heatpump_parameters.field_1]
                vary = "space"
                injection_temp = 13.6
                injection_rate = 0.00024

                [heatpump_parameters.field]
                number = 2
                injection_temp = 13.6
                injection_rate = 0.00024
                "#,
            )
            .unwrap(),
        );
        let err = settings.prepare(None).unwrap_err();
        assert!(matches!(
            err,
            VaryError::InvalidParameter { ref parameter, .. } if parameter == "field_1"
        ));
    }

    #[test]
    fn test_fix_pump_without_location() {
        let mut settings = Settings::defaults();
        settings.override_with(
            Settings::from_toml_str(
                r#"
                [heatpump_parameters.hp1]
                vary = "fix"
                injection_temp = 13.6
                injection_rate = 0.00024
                "#,
            )
            .unwrap(),
        );
        assert!(settings.prepare(None).is_err());
    }

    #[test]
    fn test_file_reference_becomes_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("permeability.txt")).unwrap();
        for value in 0..8 {
            writeln!(file, "{}", 1e-10 * (value + 1) as f64).unwrap();
        }

        let mut settings = Settings::defaults();
        settings.override_with(
            Settings::from_toml_str(
                r#"
                [general]
                number_cells = [4, 2]

                [hydrogeological_parameters.permeability]
                vary = "fix"
                value = { file = "permeability.txt" }

                [heatpump_parameters.hp1]
                vary = "fix"
                location = [1, 1]
                injection_temp = 13.6
                injection_rate = 0.00024
                "#,
            )
            .unwrap(),
        );

        let scenario = settings.prepare(Some(dir.path())).unwrap();
        let permeability = scenario
            .parameters
            .iter()
            .find(|spec| spec.name == "permeability")
            .unwrap();
        match &permeability.method {
            VaryMethod::Fix(FixValue::Field(field)) => assert_eq!(field.len(), 8),
            other => panic!("expected a field, got {other:?}"),
        }
    }
}
