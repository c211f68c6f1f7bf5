//! Configuration loading and validation

use serde::Deserialize;
use std::path::Path;

use crate::controller::{Gains, OutputClamp, PidController, DEFAULT_SAMPLE_TIME};
use crate::error::{ConfigError, ControllerError, ModelError};
use crate::plant::{CartParams, SimParams};

pub const DEFAULT_CONFIG_PATH: &str = "config/pendulum.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub controller: ControllerConfig,
    pub model: SimParams,
    pub cart: CartParams,
    pub server: ServerConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub sample_time: f64,
    /// Unset bounds leave that side of the output unbounded.
    pub min_output: Option<f64>,
    pub max_output: Option<f64>,
}

impl ControllerConfig {
    pub fn gains(&self) -> Gains {
        Gains::new(self.kp, self.ki, self.kd)
    }

    pub fn clamp(&self) -> Result<OutputClamp, ControllerError> {
        OutputClamp::new(
            self.min_output.unwrap_or(f64::MIN),
            self.max_output.unwrap_or(f64::MAX),
        )
    }

    pub fn build(&self) -> Result<PidController, ControllerError> {
        Ok(PidController::new(self.gains(), self.sample_time)?.with_clamp(self.clamp()?))
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let gains = Gains::default();
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            sample_time: DEFAULT_SAMPLE_TIME,
            min_output: None,
            max_output: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Wait for a `start_stop` request before the first tick.
    pub start_paused: bool,
    pub command_buffer: usize,
    /// Used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Stop after this many seconds; run until interrupted when unset.
    pub run_for_secs: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            start_paused: true,
            command_buffer: 64,
            log_filter: "info".to_string(),
            run_for_secs: None,
        }
    }
}

impl SystemConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SystemConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.build()?;

        let model = &self.model;
        if !model.delta_t.is_finite() || model.delta_t <= 0.0 {
            return Err(invalid(format!("model.delta_t must be positive, got {}", model.delta_t)));
        }
        if self.controller.sample_time < model.delta_t {
            return Err(invalid(format!(
                "controller.sample_time ({}) must not be shorter than model.delta_t ({})",
                self.controller.sample_time, model.delta_t
            )));
        }
        model.model_params().validate(self.controller.sample_time)?;
        if !model.simulation_time.is_finite() || model.simulation_time <= 0.0 {
            return Err(invalid("model.simulation_time must be positive".to_string()));
        }

        let cart = &self.cart;
        for (name, value) in [
            ("cart.cart_mass", cart.cart_mass),
            ("cart.pendulum_mass", cart.pendulum_mass),
            ("cart.length", cart.length),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{name} must be positive, got {value}")));
            }
        }

        if self.runtime.command_buffer == 0 {
            return Err(invalid("runtime.command_buffer must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(what: String) -> ConfigError {
    ConfigError::Invalid { what }
}

/// Loads the configuration file. A missing file yields the defaults; an
/// unreadable or malformed one is an error.
pub fn load_config(path: &Path) -> Result<SystemConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => SystemConfig::from_toml_str(&contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(SystemConfig::default()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
