pub mod constants;
pub mod datapoint;
pub mod error;
pub mod field;
pub mod file_ref;
pub mod grid;
pub mod math_utils;
pub mod multiplexer;
pub mod parameter;
pub mod perlin_field;
pub mod pipeline;
pub mod placement;
pub mod resolve;
pub mod seed;
pub mod settings;
pub mod time_series;

pub use datapoint::{Datapoint, HeatPump, ResolvedValue};
pub use error::{Result, VaryError};
pub use grid::Grid;
pub use multiplexer::{Scenario, expand};
pub use settings::Settings;
