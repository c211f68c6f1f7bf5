//! Plant module - the physical model the control loop closes around

pub mod cart_pole;

pub use cart_pole::{CartParams, CartPole, SimParams};

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::ModelError;

/// Longest measurement delay accepted, in microseconds. Models may clamp
/// further to their own history depth.
pub const MAX_DELAY_US: u64 = 1_000_000;

/// Physical model boundary consumed by the control loop.
pub trait Plant {
    /// Signal handed to the controller this tick.
    fn control_error(&self) -> f64;

    /// Holds `output` as the actuator command for `period` seconds of
    /// simulated time.
    fn apply(&mut self, output: f64, period: f64);

    /// Returns the model to its initial pose.
    fn reset(&mut self);

    fn set_params(&mut self, params: ModelParams);

    fn params(&self) -> ModelParams;

    fn state(&self) -> ModelState;

    /// True once the simulation horizon has been reached.
    fn finished(&self) -> bool;
}

/// Model parameters that can be changed while the loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Reference angle in radians, 0 is upright.
    pub ref_angle: f64,
    /// Measurement delay in microseconds.
    pub delay_us: u64,
    /// Upper bound of the random extra sleep per tick, in microseconds.
    pub jitter_us: u64,
}

impl ModelParams {
    /// Checks the parameters against a loop running every `sample_time`
    /// seconds. Jitter may not exceed one sample period.
    pub fn validate(&self, sample_time: f64) -> Result<(), ModelError> {
        if !(-PI..=PI).contains(&self.ref_angle) {
            return Err(ModelError::RefAngleOutOfRange(self.ref_angle));
        }
        let max_jitter_us = (sample_time * 1e6).round() as u64;
        if self.jitter_us > max_jitter_us {
            return Err(ModelError::JitterTooLarge {
                jitter_us: self.jitter_us,
                max_us: max_jitter_us,
            });
        }
        if self.delay_us > MAX_DELAY_US {
            return Err(ModelError::DelayTooLarge {
                delay_us: self.delay_us,
                max_us: MAX_DELAY_US,
            });
        }
        Ok(())
    }
}

/// Physical state published after every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ModelState {
    pub time: f64,
    pub x: f64,
    pub x_dot: f64,
    pub x_dot_dot: f64,
    pub theta: f64,
    pub theta_dot: f64,
    pub theta_dot_dot: f64,
    pub force: f64,
    pub energy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(ref_angle: f64, delay_us: u64, jitter_us: u64) -> ModelParams {
        ModelParams {
            ref_angle,
            delay_us,
            jitter_us,
        }
    }

    #[test]
    fn accepts_params_within_bounds() {
        assert!(params(0.1, 500, 10_000).validate(0.01).is_ok());
        assert!(params(-PI, MAX_DELAY_US, 0).validate(0.01).is_ok());
    }

    #[test]
    fn rejects_out_of_range_reference() {
        assert_eq!(
            params(100.0, 0, 0).validate(0.01),
            Err(ModelError::RefAngleOutOfRange(100.0))
        );
        assert!(params(f64::NAN, 0, 0).validate(0.01).is_err());
    }

    #[test]
    fn rejects_jitter_longer_than_period() {
        assert_eq!(
            params(0.0, 0, 3_000_000).validate(0.01),
            Err(ModelError::JitterTooLarge {
                jitter_us: 3_000_000,
                max_us: 10_000
            })
        );
        assert!(params(0.0, 0, u64::MAX).validate(0.01).is_err());
    }

    #[test]
    fn rejects_excessive_delay() {
        assert!(matches!(
            params(0.0, MAX_DELAY_US + 1, 0).validate(0.01),
            Err(ModelError::DelayTooLarge { .. })
        ));
    }
}
