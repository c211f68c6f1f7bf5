use serde::Deserialize;
use std::f64::consts::PI;

use super::{ModelParams, ModelState, Plant};

/// Depth of the angle history used to model measurement delay.
pub const THETA_HISTORY: usize = 100;

/// Simulation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Simulated horizon in seconds.
    pub simulation_time: f64,
    /// Integration step in seconds.
    pub delta_t: f64,
    pub gravity: f64,
    /// Reference angle in radians, must lie in [-pi, pi].
    pub ref_angle: f64,
    /// Angle the pendulum starts from after construction or reset.
    pub initial_angle: f64,
    pub delay_us: u64,
    pub jitter_us: u64,
}

impl SimParams {
    /// The runtime-tunable subset.
    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            ref_angle: self.ref_angle,
            delay_us: self.delay_us,
            jitter_us: self.jitter_us,
        }
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            simulation_time: 1000.0,
            delta_t: 0.0001,
            gravity: 9.81,
            ref_angle: PI / 32.0,
            initial_angle: PI / 32.0,
            delay_us: 0,
            jitter_us: 0,
        }
    }
}

/// Cart and pendulum physical constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CartParams {
    pub cart_mass: f64,
    pub pendulum_mass: f64,
    /// Pivot to pendulum centre of mass.
    pub length: f64,
}

impl CartParams {
    pub fn inertia(&self) -> f64 {
        self.pendulum_mass * self.length * self.length
    }
}

impl Default for CartParams {
    fn default() -> Self {
        Self {
            cart_mass: 5.0,
            pendulum_mass: 0.5,
            length: 1.0,
        }
    }
}

/// Inverted pendulum on a cart driven by a horizontal force.
///
/// Integrated with explicit Euler: positions advance with the previous step's
/// velocities, velocities with the previous step's accelerations, and the new
/// accelerations come from solving the coupled 2x2 system at the new pose.
pub struct CartPole {
    sim: SimParams,

    // Constant terms of the equations of motion
    c_ml: f64,
    total_mass: f64,
    a: f64,

    // Runtime
    time: f64,
    force: f64,

    // Pendulum
    theta: [f64; THETA_HISTORY],
    head: usize,
    theta_dot: f64,
    theta_dot_dot: f64,

    // Cart
    x: f64,
    x_dot: f64,
    x_dot_dot: f64,
}

impl CartPole {
    pub fn new(sim: SimParams, cart: CartParams) -> Self {
        let c_ml = cart.pendulum_mass * cart.length;
        let total_mass = cart.cart_mass + cart.pendulum_mass;
        let a = cart.inertia() + cart.pendulum_mass * cart.length * cart.length;
        let mut model = Self {
            sim,
            c_ml,
            total_mass,
            a,
            time: 0.0,
            force: 0.0,
            theta: [0.0; THETA_HISTORY],
            head: 0,
            theta_dot: 0.0,
            theta_dot_dot: 0.0,
            x: 0.0,
            x_dot: 0.0,
            x_dot_dot: 0.0,
        };
        model.reset();
        model
    }

    pub fn theta(&self) -> f64 {
        self.theta[self.head]
    }

    /// Angle as seen by the sensor, `delay_us` in the past.
    pub fn measured_theta(&self) -> f64 {
        let steps = (self.sim.delay_us as f64 * 1e-6 / self.sim.delta_t).round() as usize;
        let steps = steps.min(THETA_HISTORY - 1);
        self.theta[(self.head + THETA_HISTORY - steps) % THETA_HISTORY]
    }

    pub fn energy(&self) -> f64 {
        let cos = self.theta().cos();
        0.5 * self.total_mass * self.x_dot * self.x_dot
            + self.c_ml * cos * self.x_dot * self.theta_dot
            + 0.5 * self.a * self.theta_dot * self.theta_dot
            + self.c_ml * self.sim.gravity * cos
    }

    fn step(&mut self) {
        let dt = self.sim.delta_t;

        let theta_dot = self.theta_dot + dt * self.theta_dot_dot;
        let theta = wrap_angle(self.theta() + dt * self.theta_dot);

        let x_dot = self.x_dot + dt * self.x_dot_dot;
        let x = self.x + dt * self.x_dot;

        let (sin, cos) = theta.sin_cos();
        let coupling = self.c_ml * cos;
        let cart_rhs = -self.c_ml * theta_dot * theta_dot * sin - self.force;
        let pendulum_rhs = -self.c_ml * self.sim.gravity * sin;

        let x_dot_dot = (coupling * pendulum_rhs - self.a * cart_rhs)
            / (self.a * self.total_mass - coupling * coupling);
        let theta_dot_dot = -(pendulum_rhs + coupling * x_dot_dot) / self.a;

        self.head = (self.head + 1) % THETA_HISTORY;
        self.theta[self.head] = theta;
        self.theta_dot = theta_dot;
        self.theta_dot_dot = theta_dot_dot;

        self.x = x;
        self.x_dot = x_dot;
        self.x_dot_dot = x_dot_dot;

        self.time += dt;
    }
}

impl Plant for CartPole {
    fn control_error(&self) -> f64 {
        self.measured_theta() - self.sim.ref_angle
    }

    fn apply(&mut self, output: f64, period: f64) {
        self.force = output;
        let steps = ((period / self.sim.delta_t).round() as usize).max(1);
        for _ in 0..steps {
            if self.finished() {
                break;
            }
            self.step();
        }
    }

    fn reset(&mut self) {
        self.time = 0.0;
        self.force = 0.0;
        // A delayed read right after reset sees the initial pose.
        self.theta = [self.sim.initial_angle; THETA_HISTORY];
        self.head = 0;
        self.theta_dot = 0.0;
        self.theta_dot_dot = 0.0;
        self.x = 0.0;
        self.x_dot = 0.0;
        self.x_dot_dot = 0.0;
    }

    fn set_params(&mut self, params: ModelParams) {
        self.sim.ref_angle = wrap_angle(params.ref_angle);
        self.sim.delay_us = params.delay_us;
        self.sim.jitter_us = params.jitter_us;
    }

    fn params(&self) -> ModelParams {
        self.sim.model_params()
    }

    fn state(&self) -> ModelState {
        ModelState {
            time: self.time,
            x: self.x,
            x_dot: self.x_dot,
            x_dot_dot: self.x_dot_dot,
            theta: self.theta(),
            theta_dot: self.theta_dot,
            theta_dot_dot: self.theta_dot_dot,
            force: self.force,
            energy: self.energy(),
        }
    }

    fn finished(&self) -> bool {
        self.time >= self.sim.simulation_time
    }
}

/// Folds an angle back into [-pi, pi].
fn wrap_angle(theta: f64) -> f64 {
    if theta.abs() > PI {
        (theta + PI).rem_euclid(2.0 * PI) - PI
    } else {
        theta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upright() -> CartPole {
        CartPole::new(
            SimParams {
                ref_angle: 0.0,
                initial_angle: 0.0,
                ..SimParams::default()
            },
            CartParams::default(),
        )
    }

    #[test]
    fn balanced_pendulum_stays_upright_without_force() {
        let mut model = upright();
        for _ in 0..100 {
            model.apply(0.0, 0.01);
        }
        let state = model.state();
        assert_eq!(state.theta, 0.0);
        assert_eq!(state.x, 0.0);
        assert!((state.time - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tilted_pendulum_falls() {
        let mut model = CartPole::new(
            SimParams {
                ref_angle: 0.0,
                initial_angle: 0.1,
                ..SimParams::default()
            },
            CartParams::default(),
        );
        for _ in 0..100 {
            model.apply(0.0, 0.01);
        }
        assert!(model.theta() > 0.2, "theta {}", model.theta());
        assert!(model.state().theta_dot > 0.0);
    }

    #[test]
    fn positive_force_accelerates_cart_forward() {
        let mut model = upright();
        model.apply(10.0, 0.01);
        let state = model.state();
        assert!(state.x_dot_dot > 0.0);
        assert!(state.theta_dot_dot < 0.0);
        assert_eq!(state.force, 10.0);
    }

    #[test]
    fn delay_reads_older_samples() {
        let mut model = CartPole::new(
            SimParams {
                ref_angle: 0.0,
                initial_angle: 0.1,
                ..SimParams::default()
            },
            CartParams::default(),
        );
        model.apply(0.0, 0.005);
        assert_eq!(model.measured_theta(), model.theta());

        model.set_params(ModelParams {
            ref_angle: 0.0,
            delay_us: 2_000,
            jitter_us: 0,
        });
        assert!(model.measured_theta() < model.theta());

        // Delays beyond the buffer depth read the oldest sample kept.
        model.set_params(ModelParams {
            ref_angle: 0.0,
            delay_us: 1_000_000,
            jitter_us: 0,
        });
        assert_eq!(
            model.measured_theta(),
            model.theta[(model.head + 1) % THETA_HISTORY]
        );
    }

    #[test]
    fn control_error_is_measured_minus_reference() {
        let model = CartPole::new(SimParams::default(), CartParams::default());
        assert_eq!(model.control_error(), 0.0);

        let mut model = upright();
        model.set_params(ModelParams {
            ref_angle: 0.2,
            delay_us: 0,
            jitter_us: 0,
        });
        assert!((model.control_error() + 0.2).abs() < 1e-12);
    }

    #[test]
    fn reset_restores_initial_pose() {
        let mut model = CartPole::new(SimParams::default(), CartParams::default());
        for _ in 0..20 {
            model.apply(25.0, 0.01);
        }
        assert!(model.state().time > 0.0);
        model.reset();
        let state = model.state();
        assert_eq!(state.time, 0.0);
        assert_eq!(state.theta, PI / 32.0);
        assert_eq!(state.x, 0.0);
        assert_eq!(state.force, 0.0);
    }

    #[test]
    fn stops_at_simulation_horizon() {
        let mut model = CartPole::new(
            SimParams {
                simulation_time: 0.05,
                ..SimParams::default()
            },
            CartParams::default(),
        );
        for _ in 0..10 {
            model.apply(0.0, 0.01);
        }
        assert!(model.finished());
        assert!(model.state().time < 0.0502);
    }

    #[test]
    fn wrap_angle_folds_into_range() {
        assert!((wrap_angle(PI + 0.5) - (0.5 - PI)).abs() < 1e-12);
        assert!((wrap_angle(-PI - 0.5) - (PI - 0.5)).abs() < 1e-12);
        assert_eq!(wrap_angle(1.0), 1.0);
        let far = wrap_angle(100.0);
        assert!((-PI..=PI).contains(&far));
        let turns = (100.0 - far) / (2.0 * PI);
        assert!((turns - turns.round()).abs() < 1e-9);
    }

    #[test]
    fn energy_is_conserved_without_force() {
        let mut model = CartPole::new(
            SimParams {
                initial_angle: 0.05,
                delta_t: 0.00001,
                ..SimParams::default()
            },
            CartParams::default(),
        );
        let start = model.energy();
        for _ in 0..20 {
            model.apply(0.0, 0.01);
        }
        assert!((model.energy() - start).abs() / start.abs() < 1e-3);
    }
}
