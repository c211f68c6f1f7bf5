use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::plant::ModelState;

/// Snapshot of the running system, published by the control thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Telemetry {
    #[serde(flatten)]
    pub model: ModelState,
    pub paused: bool,
    pub started: bool,
    pub ticks: u64,
}

/// Latest telemetry, written by the control thread and read by request
/// handlers.
#[derive(Clone, Default)]
pub struct TelemetryBuffer {
    data: Arc<RwLock<Telemetry>>,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, telemetry: Telemetry) {
        *self.data.write() = telemetry;
    }

    pub fn get(&self) -> Telemetry {
        *self.data.read()
    }
}

/// Process-wide stop request, observable from blocking and async code.
#[derive(Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        loop {
            // Register before checking the flag so a trigger in between is
            // not missed.
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Guard that triggers shutdown when dropped.
    pub fn on_exit(&self) -> ShutdownOnExit {
        ShutdownOnExit(self.clone())
    }
}

/// Triggers shutdown when the owning thread leaves its body, whether it
/// returns normally, returns an error or unwinds.
pub struct ShutdownOnExit(Shutdown);

impl Drop for ShutdownOnExit {
    fn drop(&mut self) {
        self.0.trigger();
    }
}
