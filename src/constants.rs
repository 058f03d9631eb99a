// Domain defaults used when a settings file leaves a value out.

pub const DEFAULT_NUMBER_CELLS: [usize; 3] = [32, 256, 1];
pub const DEFAULT_CELL_RESOLUTION: f64 = 5.0; // m, cells are cubic
pub const DEFAULT_RANDOM_SEED: u64 = 0;
pub const DEFAULT_NUMBER_DATAPOINTS: usize = 1;
pub const DEFAULT_FINAL_TIME: f64 = 27.5;
pub const DEFAULT_TIME_UNIT: &str = "year";

// hydrogeological defaults
pub const DEFAULT_PERMEABILITY: f64 = 1.29e-10; // m²
pub const DEFAULT_PRESSURE_GRADIENT: f64 = -0.0025;
pub const DEFAULT_TEMPERATURE_C: f64 = 10.6;
pub const DEFAULT_POROSITY: f64 = 0.25;

// default heat pump
pub const DEFAULT_HEATPUMP_NAME: &str = "hp1";
pub const DEFAULT_HEATPUMP_CELL: [f64; 3] = [16.0, 32.0, 0.0];
pub const DEFAULT_INJECTION_TEMP_C: f64 = 13.6;
pub const DEFAULT_INJECTION_RATE_M3_S: f64 = 0.00024;

// Parameters every datapoint has to carry, in the order they are checked.
pub const PERMEABILITY: &str = "permeability";
pub const PRESSURE_GRADIENT: &str = "pressure_gradient";
pub const TEMPERATURE: &str = "temperature";
pub const POROSITY: &str = "porosity";
pub const REQUIRED_PARAMETERS: [&str; 3] = [PRESSURE_GRADIENT, PERMEABILITY, TEMPERATURE];

pub const INJECTION_TEMP: &str = "injection_temp";
pub const INJECTION_RATE: &str = "injection_rate";

// physical limits
pub const ABSOLUTE_ZERO_C: f64 = -273.15;

// spatial field generation
pub const PERLIN_OFFSET_SPAN: f64 = 4242.0; // sampling offset range per axis
pub const DEFAULT_ANISOTROPY: f64 = 1.0;
pub const DEFAULT_OCTAVES: u32 = 1;
pub const OCTAVE_PERSISTENCE: f64 = 0.5;
pub const OCTAVE_LACUNARITY: f64 = 2.0;
pub const REFERENCE_PRESSURE_PA: f64 = 101_325.0; // standard atmosphere
pub const PRESSURE_STEP_SCALE: f64 = 1_000.0; // gradient * resolution per cell, to Pa

// heat pump placement
pub const DEFAULT_MIN_PUMP_DISTANCE: f64 = 1.0; // cells
pub const DEFAULT_EDGE_MARGIN: usize = 0; // cells
pub const MAX_PLACEMENT_ATTEMPTS_PER_PUMP: usize = 1_000;

// temporal events
pub const DEFAULT_SAMPLES_PER_PERIOD: usize = 12;
pub const MAX_SCHEDULE_POINTS: usize = 100_000; // control points per time series
