//! Stage sequence: Loading → Preparation → Validation → Variation.
//!
//! Each stage takes the state left by the previous one and hands on a new
//! one. The first failing stage halts the run and its error is returned
//! as is. Rendering, simulating and visualizing consume the datapoints
//! written by the variation stage and live outside this crate.

use crate::constants::REQUIRED_PARAMETERS;
use crate::datapoint::Datapoint;
use crate::error::{Result, VaryError};
use crate::multiplexer::{self, Scenario};
use crate::settings::Settings;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const DATAPOINT_FILE: &str = "datapoint.json";

/// Yes/no questions asked during an interactive run.
pub trait Prompt {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Answers every question with yes.
pub struct AssumeYes;

impl Prompt for AssumeYes {
    fn confirm(&mut self, _question: &str) -> bool {
        true
    }
}

/// Asks on the terminal. Anything but `n`, `no` or `q` counts as yes.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&mut self, question: &str) -> bool {
        print!("{question} Y/n ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => !matches!(answer.trim(), "n" | "N" | "no" | "q"),
        }
    }
}

/// Command line values that take precedence over the settings file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub output_directory: Option<PathBuf>,
    pub non_interactive: bool,
    pub datapoints: Option<usize>,
    pub parallel: bool,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.output_directory {
            settings.general.output_directory = dir.clone();
        }
        if self.non_interactive {
            settings.general.interactive = false;
        }
        if let Some(count) = self.datapoints {
            settings.general.number_datapoints = count;
        }
        if self.parallel {
            settings.general.parallel = true;
        }
    }
}

/// What the stages hand to each other.
#[derive(Debug, Default)]
pub struct PipelineState {
    pub settings_file: Option<PathBuf>,
    pub settings: Option<Settings>,
    pub scenario: Option<Scenario>,
    pub seed: Option<u64>,
    pub datapoints: Vec<Datapoint>,
    pub written: Vec<PathBuf>,
}

impl PipelineState {
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Some(settings),
            ..Self::default()
        }
    }

    fn interactive(&self) -> bool {
        self.settings
            .as_ref()
            .is_some_and(|settings| settings.general.interactive)
    }

    fn profiling(&self) -> bool {
        self.settings
            .as_ref()
            .is_some_and(|settings| settings.general.profiling)
    }
}

fn require<'a, T>(value: &'a Option<T>, stage: &str, what: &str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| VaryError::Stage {
        stage: stage.to_string(),
        message: format!("no {what} available, did an earlier stage run?"),
    })
}

pub trait Stage {
    fn name(&self) -> &str;

    /// Whether an interactive run asks before starting this stage.
    fn needs_confirmation(&self) -> bool {
        false
    }

    fn run(&self, state: PipelineState, prompt: &mut dyn Prompt) -> Result<PipelineState>;
}

/// Defaults overridden by the settings file, overridden by the command line.
pub struct LoadingStage {
    pub settings_file: Option<PathBuf>,
    pub overrides: SettingsOverrides,
}

impl Stage for LoadingStage {
    fn name(&self) -> &str {
        "loading"
    }

    fn run(&self, mut state: PipelineState, _prompt: &mut dyn Prompt) -> Result<PipelineState> {
        let mut settings = Settings::load(self.settings_file.as_deref())?;
        self.overrides.apply(&mut settings);
        if settings.general.interactive {
            info!("running interactively");
        } else {
            info!("running non-interactively");
        }
        debug!(?settings, "loaded settings");
        state.settings_file = self.settings_file.clone();
        state.settings = Some(settings);
        Ok(state)
    }
}

/// File references are read, heat pump groups expanded and the seed fixed.
pub struct PreparationStage;

impl Stage for PreparationStage {
    fn name(&self) -> &str {
        "preparation"
    }

    fn run(&self, mut state: PipelineState, _prompt: &mut dyn Prompt) -> Result<PipelineState> {
        let settings = require(&state.settings, self.name(), "settings")?;
        let base_dir = state
            .settings_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        let scenario = settings.prepare(base_dir.as_deref())?;
        let seed = settings.general.resolve_seed();
        info!(
            parameters = scenario.parameters.len(),
            heat_pumps = scenario.heat_pumps.len(),
            seed,
            "prepared scenario"
        );
        state.scenario = Some(scenario);
        state.seed = Some(seed);
        Ok(state)
    }
}

/// Checks that hold for the scenario as a whole, before any datapoint is built.
pub struct ValidationStage;

impl Stage for ValidationStage {
    fn name(&self) -> &str {
        "validation"
    }

    fn run(&self, state: PipelineState, _prompt: &mut dyn Prompt) -> Result<PipelineState> {
        let settings = require(&state.settings, self.name(), "settings")?;
        let scenario = require(&state.scenario, self.name(), "scenario")?;
        scenario.validate()?;

        for name in REQUIRED_PARAMETERS {
            if !scenario.parameters.iter().any(|spec| spec.name == name) {
                return Err(VaryError::validation(name, "required parameter is missing"));
            }
        }
        if scenario.heat_pumps.is_empty() {
            return Err(VaryError::validation(
                "heat_pumps",
                "at least one heat pump is required",
            ));
        }
        if settings.general.number_datapoints == 0 {
            return Err(VaryError::invalid_parameter(
                "number_datapoints",
                "at least one datapoint is required",
            ));
        }
        info!("settings in use:\n{settings}");
        Ok(state)
    }
}

/// Expands the scenario and writes one `datapoint.json` per datapoint.
pub struct VariationStage;

impl Stage for VariationStage {
    fn name(&self) -> &str {
        "variation"
    }

    fn needs_confirmation(&self) -> bool {
        true
    }

    fn run(&self, mut state: PipelineState, prompt: &mut dyn Prompt) -> Result<PipelineState> {
        let settings = require(&state.settings, self.name(), "settings")?;
        let scenario = require(&state.scenario, self.name(), "scenario")?;
        let seed = *require(&state.seed, self.name(), "seed")?;

        let datapoints =
            multiplexer::expand(scenario, settings.general.number_datapoints, seed)?;
        let interactive = settings.general.interactive;
        let output = settings.general.output_directory.clone();

        let mut written = Vec::new();
        for datapoint in &datapoints {
            if let Some(path) = write_datapoint(&output, datapoint, interactive, prompt)? {
                written.push(path);
            }
        }
        info!(
            datapoints = datapoints.len(),
            written = written.len(),
            output = %output.display(),
            "variation finished"
        );
        state.datapoints = datapoints;
        state.written = written;
        Ok(state)
    }
}

/// Write `<output>/datapoint-<index>/datapoint.json`.
///
/// Returns the path if the file was written. An identical existing file is
/// left alone; a differing one is replaced after a warning, or only after
/// confirmation when `interactive`.
pub fn write_datapoint(
    output: &Path,
    datapoint: &Datapoint,
    interactive: bool,
    prompt: &mut dyn Prompt,
) -> Result<Option<PathBuf>> {
    let dir = output.join(format!("datapoint-{}", datapoint.index));
    fs::create_dir_all(&dir).map_err(|e| VaryError::io(&dir, e))?;
    let path = dir.join(DATAPOINT_FILE);

    let mut contents = serde_json::to_string_pretty(&datapoint.summary())?;
    contents.push('\n');

    if path.exists() {
        let existing = fs::read_to_string(&path).map_err(|e| VaryError::io(&path, e))?;
        if existing == contents {
            debug!(path = %path.display(), "datapoint unchanged");
            return Ok(None);
        }
        if interactive {
            let question = format!("{} exists with different content, overwrite?", path.display());
            if !prompt.confirm(&question) {
                info!(path = %path.display(), "keeping existing datapoint");
                return Ok(None);
            }
        } else {
            warn!(path = %path.display(), "overwriting datapoint with different content");
        }
    }

    fs::write(&path, contents).map_err(|e| VaryError::io(&path, e))?;
    Ok(Some(path))
}

#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage_name: String,
    pub elapsed: Duration,
}

/// How a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The user declined to continue.
    Declined,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub outcome: Outcome,
    pub state: PipelineState,
    pub timings: Vec<StageTiming>,
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Loading, preparation, validation and variation.
    pub fn standard(settings_file: Option<PathBuf>, overrides: SettingsOverrides) -> Self {
        Self::new(vec![
            Box::new(LoadingStage {
                settings_file,
                overrides,
            }),
            Box::new(PreparationStage),
            Box::new(ValidationStage),
            Box::new(VariationStage),
        ])
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn run(&self, prompt: &mut dyn Prompt) -> Result<PipelineReport> {
        self.run_from(PipelineState::default(), prompt)
    }

    pub fn run_from(
        &self,
        mut state: PipelineState,
        prompt: &mut dyn Prompt,
    ) -> Result<PipelineReport> {
        let mut timings = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            if stage.needs_confirmation() && state.interactive() {
                let question = format!("Do you want to run the {} stage?", stage.name());
                if !prompt.confirm(&question) {
                    info!(stage = stage.name(), "exiting as instructed");
                    return Ok(PipelineReport {
                        outcome: Outcome::Declined,
                        state,
                        timings,
                    });
                }
            }

            debug!(stage = stage.name(), "running stage");
            let start = Instant::now();
            state = stage.run(state, prompt).inspect_err(|e| {
                error!(stage = stage.name(), error = %e, "stage failed");
            })?;
            timings.push(StageTiming {
                stage_name: stage.name().to_string(),
                elapsed: start.elapsed(),
            });
        }

        if state.profiling() {
            log_timing_report(&timings);
        }
        Ok(PipelineReport {
            outcome: Outcome::Completed,
            state,
            timings,
        })
    }
}

fn log_timing_report(timings: &[StageTiming]) {
    let total: Duration = timings.iter().map(|timing| timing.elapsed).sum();
    for timing in timings {
        let share = if total.is_zero() {
            0.0
        } else {
            timing.elapsed.as_secs_f64() / total.as_secs_f64() * 100.0
        };
        info!(
            "stage {:<12} | {:>10.3}ms | {:>5.1}%",
            timing.stage_name,
            timing.elapsed.as_secs_f64() * 1000.0,
            share
        );
    }
    info!("total {:.3}ms", total.as_secs_f64() * 1000.0);
}
