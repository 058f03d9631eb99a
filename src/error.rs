//! Error taxonomy for parameter resolution and datapoint expansion.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaryError>;

#[derive(Debug, Error)]
pub enum VaryError {
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("invalid parameter `{parameter}`: {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("heat pump `{pump}` at cell {location:?} lies outside the domain {extent:?}")]
    OutOfBounds {
        pump: String,
        location: [f64; 3],
        extent: [usize; 3],
    },

    #[error(
        "heat pumps `{first}` and `{second}` are {distance:.3} cells apart, minimum distance is {min_distance}"
    )]
    Overlap {
        first: String,
        second: String,
        distance: f64,
        min_distance: f64,
    },

    #[error(
        "placed only {placed} of {requested} heat pumps after {attempts} attempts (min distance {min_distance})"
    )]
    PlacementExhausted {
        requested: usize,
        placed: usize,
        attempts: usize,
        min_distance: f64,
    },

    #[error("parameter `{parameter}` has {actual} values, grid has {expected} cells")]
    ShapeMismatch {
        parameter: String,
        expected: usize,
        actual: usize,
    },

    #[error("validation failed for `{parameter}`: {message}")]
    Validation { parameter: String, message: String },

    #[error("datapoint {index}: {source}")]
    Datapoint {
        index: usize,
        #[source]
        source: Box<VaryError>,
    },

    #[error("stage `{stage}` failed: {message}")]
    Stage { stage: String, message: String },

    #[error("unsupported file reference {path}")]
    UnsupportedFile { path: PathBuf },

    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl VaryError {
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        VaryError::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn validation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        VaryError::Validation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VaryError::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the index of the datapoint being built.
    pub fn in_datapoint(self, index: usize) -> Self {
        match self {
            already @ VaryError::Datapoint { .. } => already,
            other => VaryError::Datapoint {
                index,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with any datapoint context stripped.
    pub fn root(&self) -> &VaryError {
        match self {
            VaryError::Datapoint { source, .. } => source.root(),
            other => other,
        }
    }

    /// Index of the datapoint that triggered the error, if known.
    pub fn datapoint_index(&self) -> Option<usize> {
        match self {
            VaryError::Datapoint { index, .. } => Some(*index),
            _ => None,
        }
    }
}
