use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::control_thread::{spawn_control_thread, ControlLoop, LoopSummary};
use super::interface_thread::spawn_interface_thread;
use crate::async_impl::AdminServer;
use crate::config::SystemConfig;
use crate::controller::{PidController, SharedController};
use crate::error::{Error, Result};
use crate::ipc::{CommandChannel, Shutdown, TelemetryBuffer};
use crate::metrics::{MetricsReport, TimingMetrics};
use crate::plant::Plant;

const WAIT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub control: LoopSummary,
    pub metrics: MetricsReport,
}

/// Owns the state shared by the `control` and `interface` threads and runs
/// both under one scope, so neither outlives [`Supervisor::run`].
pub struct Supervisor {
    controller: SharedController,
    commands: CommandChannel,
    telemetry: TelemetryBuffer,
    metrics: TimingMetrics,
    shutdown: Shutdown,
    start_paused: bool,
}

impl Supervisor {
    pub fn new(controller: PidController, command_buffer: usize, start_paused: bool) -> Result<Self> {
        Ok(Self {
            controller: SharedController::new(controller),
            commands: CommandChannel::new(command_buffer),
            telemetry: TelemetryBuffer::new(),
            metrics: TimingMetrics::new()?,
            shutdown: Shutdown::new(),
            start_paused,
        })
    }

    pub fn from_config(config: &SystemConfig) -> Result<Self> {
        Self::new(
            config.controller.build()?,
            config.runtime.command_buffer,
            config.runtime.start_paused,
        )
    }

    pub fn controller(&self) -> &SharedController {
        &self.controller
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Runs the control loop over `plant` and the administrative interface
    /// on `listener` until `run_for` elapses or shutdown is triggered
    /// (Ctrl-C or either thread exiting). Both threads are joined before
    /// this returns.
    pub fn run<P>(&self, plant: P, listener: TcpListener, run_for: Option<Duration>) -> Result<RunSummary>
    where
        P: Plant + Send,
    {
        let control_loop = ControlLoop::new(
            plant,
            self.controller.clone(),
            self.commands.clone(),
            self.telemetry.clone(),
            self.metrics.clone(),
            self.start_paused,
        )?;
        // Seed the buffer so status requests are accurate before the first tick.
        control_loop.publish();
        let server = AdminServer::new(
            self.controller.clone(),
            self.commands.clone(),
            self.telemetry.clone(),
            self.metrics.clone(),
        );

        let (control, interface) = thread::scope(|s| -> Result<_> {
            // Dropped before the scope joins, so an early return still
            // stops whichever thread did start.
            let _stop = self.shutdown.on_exit();

            let control = spawn_control_thread(s, control_loop, self.shutdown.clone())?;
            let interface = spawn_interface_thread(s, server, listener, self.shutdown.clone())?;
            info!("control and interface threads started");

            self.wait(run_for);
            self.shutdown.trigger();

            Ok((control.join(), interface.join()))
        })?;

        let control = control.map_err(|_| {
            error!("control thread panicked");
            Error::ThreadPanicked("control")
        })?;
        interface
            .map_err(|_| {
                error!("interface thread panicked");
                Error::ThreadPanicked("interface")
            })?
            .inspect_err(|err| error!(%err, "interface thread failed"))?;

        info!(ticks = control.ticks, "all threads joined");
        Ok(RunSummary {
            control,
            metrics: self.metrics.report(),
        })
    }

    fn wait(&self, run_for: Option<Duration>) {
        let deadline = run_for.map(|limit| Instant::now() + limit);
        while !self.shutdown.is_triggered() {
            let mut pause = WAIT_POLL;
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    info!("run duration elapsed");
                    return;
                }
                pause = pause.min(remaining);
            }
            thread::sleep(pause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Gains;
    use crate::plant::{CartParams, CartPole, SimParams};

    #[test]
    fn run_for_stops_both_threads() {
        let supervisor = Supervisor::new(
            PidController::new(Gains::new(150.0, 50.0, 4000.0), 0.01).unwrap(),
            8,
            false,
        )
        .unwrap();
        let plant = CartPole::new(SimParams::default(), CartParams::default());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();

        let summary = supervisor
            .run(plant, listener, Some(Duration::from_millis(300)))
            .unwrap();

        assert!(summary.control.ticks > 0);
        assert_eq!(summary.metrics.ticks, summary.control.ticks);
        assert!(supervisor.shutdown().is_triggered());
    }

    #[test]
    fn external_shutdown_ends_an_unbounded_run() {
        let supervisor = Supervisor::new(PidController::default(), 8, true).unwrap();
        let plant = CartPole::new(SimParams::default(), CartParams::default());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let shutdown = supervisor.shutdown().clone();

        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            shutdown.trigger();
        });
        let summary = supervisor.run(plant, listener, None).unwrap();
        trigger.join().unwrap();

        // Started paused and never toggled.
        assert_eq!(summary.control.ticks, 0);
    }
}
