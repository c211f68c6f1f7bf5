use parking_lot::Mutex;
use std::sync::Arc;

use super::pid::{ControllerSnapshot, Gains, PidController};
use crate::error::ControllerError;

/// A [`PidController`] shared between the control thread and the interface
/// thread.
///
/// All fields sit behind one mutex and every method holds it for exactly one
/// operation, so no caller can see gains or history from two different
/// updates at once. Guards are scoped: the lock is released on every exit
/// path, unwinding included, and parking_lot does not poison.
#[derive(Clone)]
pub struct SharedController {
    inner: Arc<Mutex<PidController>>,
}

impl SharedController {
    pub fn new(controller: PidController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Hot path. Only the control thread calls this.
    #[inline]
    pub fn compute(&self, error: f64) -> f64 {
        self.inner.lock().compute(error)
    }

    pub fn retune(&self, gains: Gains) -> Result<(), ControllerError> {
        // Validate before taking the lock so a rejected request never
        // touches the critical section.
        gains.validate()?;
        self.inner.lock().retune(gains)
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    pub fn configure_clamp(&self, max: f64, min: f64) -> Result<(), ControllerError> {
        self.inner.lock().configure_clamp(max, min)
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        self.inner.lock().snapshot()
    }
}
