use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

pub const DEFAULT_SAMPLE_TIME: f64 = 0.01;

/// Longest accepted sample period, in seconds.
pub const MAX_SAMPLE_TIME: f64 = 60.0;

/// Proportional, integral and derivative gains. Always replaced as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Gains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        for (name, value) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !value.is_finite() {
                return Err(ControllerError::NonFiniteGain { name, value });
            }
        }
        Ok(())
    }
}

impl Default for Gains {
    fn default() -> Self {
        Self::new(1.0, 0.1, 0.5)
    }
}

/// Bounds applied to the returned output. `min <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputClamp {
    min: f64,
    max: f64,
}

impl OutputClamp {
    pub const UNBOUNDED: Self = Self {
        min: f64::MIN,
        max: f64::MAX,
    };

    pub fn new(min: f64, max: f64) -> Result<Self, ControllerError> {
        // NaN fails both comparisons, so check ordering through the negation.
        if !(min <= max) {
            return Err(ControllerError::InvalidClamp { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

impl Default for OutputClamp {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Point-in-time copy of every controller field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub gains: Gains,
    pub clamp: OutputClamp,
    pub prev_error: f64,
    pub prev_integral: f64,
    pub sample_time: f64,
}

/// Discrete PID controller with a clamped output.
///
/// The integral is forward Euler over the fixed `sample_time` and the
/// derivative is a plain first difference of the error. Only the returned
/// value is clamped; the integral accumulator is left unbounded, so there is
/// no anti-windup and a long saturation will wind the integral up.
#[derive(Debug, Clone)]
pub struct PidController {
    // Gains
    gains: Gains,

    // State
    prev_error: f64,
    prev_integral: f64,

    // Limits
    clamp: OutputClamp,
    sample_time: f64,
}

impl PidController {
    pub fn new(gains: Gains, sample_time: f64) -> Result<Self, ControllerError> {
        gains.validate()?;
        if !(sample_time > 0.0 && sample_time <= MAX_SAMPLE_TIME) {
            return Err(ControllerError::InvalidSampleTime(sample_time));
        }
        Ok(Self {
            gains,
            prev_error: 0.0,
            prev_integral: 0.0,
            clamp: OutputClamp::UNBOUNDED,
            sample_time,
        })
    }

    pub fn with_clamp(mut self, clamp: OutputClamp) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn compute(&mut self, error: f64) -> f64 {
        let derivative = error - self.prev_error;
        let integral = self.prev_integral + error * self.sample_time;
        let mut raw = self.gains.kp * error + self.gains.ki * integral + self.gains.kd * derivative;
        // Opposing overflowed terms (inf - inf) give NaN, which clamp passes
        // through.
        if raw.is_nan() {
            raw = 0.0;
        }

        self.prev_error = error;
        self.prev_integral = integral;

        self.clamp.apply(raw)
    }

    pub fn retune(&mut self, gains: Gains) -> Result<(), ControllerError> {
        gains.validate()?;
        self.gains = gains;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.prev_error = 0.0;
        self.prev_integral = 0.0;
    }

    /// Installs new output bounds. Takes `max` first; an inverted range is
    /// rejected and the previous bounds stay in effect.
    pub fn configure_clamp(&mut self, max: f64, min: f64) -> Result<(), ControllerError> {
        self.clamp = OutputClamp::new(min, max)?;
        Ok(())
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn clamp(&self) -> OutputClamp {
        self.clamp
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            gains: self.gains,
            clamp: self.clamp,
            prev_error: self.prev_error,
            prev_integral: self.prev_integral,
            sample_time: self.sample_time,
        }
    }
}

impl Default for PidController {
    fn default() -> Self {
        Self {
            gains: Gains::default(),
            prev_error: 0.0,
            prev_integral: 0.0,
            clamp: OutputClamp::UNBOUNDED,
            sample_time: DEFAULT_SAMPLE_TIME,
        }
    }
}
