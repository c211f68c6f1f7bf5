//! Threaded side of the system: the control loop, the interface thread and
//! the supervisor that scopes both

pub mod control_thread;
pub mod interface_thread;
pub mod supervisor;

pub use control_thread::{spawn_control_thread, ControlLoop, LoopSummary};
pub use interface_thread::spawn_interface_thread;
pub use supervisor::{RunSummary, Supervisor};
