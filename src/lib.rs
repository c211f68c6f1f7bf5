//! Real-time PID control of a simulated inverted pendulum.
//!
//! A `control` thread closes the loop between a [`plant::Plant`] and a
//! [`controller::SharedController`]; an `interface` thread serves
//! administrative requests that retune or reset the same controller while
//! the loop runs.

pub mod async_impl;
pub mod config;
pub mod controller;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod metrics;
pub mod plant;
pub mod threaded_impl;

pub use config::{load_config, SystemConfig};
pub use controller::{Gains, OutputClamp, PidController, SharedController};
pub use error::{ConfigError, ControllerError, Error, ModelError, Result};
pub use plant::{CartPole, Plant};
pub use threaded_impl::{RunSummary, Supervisor};
