//! Error types for the controller, configuration and process lifecycle.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for process-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Rejections raised at the controller's administrative boundary.
///
/// None of these can occur inside `compute`; they are caught before a bad
/// value reaches the controller state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControllerError {
    #[error("invalid clamp: min {min} must not exceed max {max}")]
    InvalidClamp { min: f64, max: f64 },

    #[error("non-finite gain {name} = {value}")]
    NonFiniteGain { name: &'static str, value: f64 },

    #[error("sample time must be finite, positive and at most 60 s, got {0}")]
    InvalidSampleTime(f64),
}

/// Model parameters outside what the control loop can honour.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("reference angle {0} outside [-pi, pi]")]
    RefAngleOutOfRange(f64),

    #[error("jitter {jitter_us} us exceeds the sample period of {max_us} us")]
    JitterTooLarge { jitter_us: u64, max_us: u64 },

    #[error("measurement delay {delay_us} us exceeds {max_us} us")]
    DelayTooLarge { delay_us: u64, max_us: u64 },
}

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {what}")]
    Invalid { what: String },

    #[error("invalid controller settings: {0}")]
    Controller(#[from] ControllerError),

    #[error("invalid model settings: {0}")]
    Model(#[from] ModelError),
}

/// Top-level error for running the system.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to create histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}
