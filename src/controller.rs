//! Controller module - PID computation and its thread-safe wrapper

pub mod pid;
pub mod shared;

pub use pid::{
    ControllerSnapshot, Gains, OutputClamp, PidController, DEFAULT_SAMPLE_TIME, MAX_SAMPLE_TIME,
};
pub use shared::SharedController;
