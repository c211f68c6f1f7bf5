//! IPC module - communication between the control and interface threads

pub mod channels;
pub mod shared_resource;

pub use channels::{CommandChannel, ModelCommand};
pub use shared_resource::{Shutdown, ShutdownOnExit, Telemetry, TelemetryBuffer};
