use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::controller::SharedController;
use crate::error::ControllerError;
use crate::ipc::{CommandChannel, ModelCommand, Shutdown, Telemetry, TelemetryBuffer};
use crate::metrics::TimingMetrics;
use crate::plant::{ModelState, Plant};

/// Longest uninterrupted wait, paused or between ticks, before re-checking
/// for shutdown.
const PAUSE_POLL: Duration = Duration::from_millis(50);

/// Ticks between debug log lines.
const LOG_EVERY: u64 = 100;

#[derive(Debug, Clone)]
pub struct LoopSummary {
    pub ticks: u64,
    pub final_state: ModelState,
}

/// Closed loop between a [`Plant`] and the shared controller. Owns the plant
/// and is the only caller of `compute`.
pub struct ControlLoop<P: Plant> {
    plant: P,
    controller: SharedController,
    commands: CommandChannel,
    telemetry: TelemetryBuffer,
    metrics: TimingMetrics,

    sample_time: f64,
    period: Duration,
    rng: StdRng,

    paused: bool,
    started: bool,
    /// Set while the plant reports a non-finite error.
    diverged: bool,
    ticks: u64,
}

impl<P: Plant> ControlLoop<P> {
    pub fn new(
        plant: P,
        controller: SharedController,
        commands: CommandChannel,
        telemetry: TelemetryBuffer,
        metrics: TimingMetrics,
        start_paused: bool,
    ) -> Result<Self, ControllerError> {
        let sample_time = controller.snapshot().sample_time;
        let period = Duration::try_from_secs_f64(sample_time)
            .map_err(|_| ControllerError::InvalidSampleTime(sample_time))?;
        Ok(Self {
            plant,
            controller,
            commands,
            telemetry,
            metrics,
            sample_time,
            period,
            rng: StdRng::from_entropy(),
            paused: start_paused,
            started: !start_paused,
            diverged: false,
            ticks: 0,
        })
    }

    pub fn plant(&self) -> &P {
        &self.plant
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn handle_command(&mut self, command: ModelCommand) {
        match command {
            ModelCommand::TogglePause => {
                self.paused = !self.paused;
                if !self.paused {
                    self.started = true;
                }
                info!(paused = self.paused, "simulation pause toggled");
            }
            ModelCommand::Reset => {
                self.plant.reset();
                self.controller.reset();
                info!("simulation reset");
            }
            ModelCommand::SetParams(params) => {
                self.plant.set_params(params);
                info!(
                    ref_angle = params.ref_angle,
                    delay_us = params.delay_us,
                    jitter_us = params.jitter_us,
                    "model parameters updated"
                );
            }
        }
    }

    pub fn drain_commands(&mut self) {
        while let Some(command) = self.commands.try_next() {
            self.handle_command(command);
        }
    }

    /// Runs one control period. Returns false when the loop is paused, the
    /// simulation horizon has been reached, or the plant's error is not
    /// finite (the controller is left untouched for that tick).
    pub fn tick(&mut self) -> bool {
        if self.paused {
            return false;
        }
        if self.plant.finished() {
            self.paused = true;
            info!(ticks = self.ticks, "simulation horizon reached, pausing");
            return false;
        }

        let error = self.plant.control_error();
        if !error.is_finite() {
            if !self.diverged {
                warn!(
                    error,
                    ticks = self.ticks,
                    "plant error is not finite, skipping ticks until reset"
                );
                self.diverged = true;
            }
            return false;
        }
        if self.diverged {
            info!("plant error finite again, resuming control");
            self.diverged = false;
        }

        let compute_start = Instant::now();
        let output = self.controller.compute(error);
        self.metrics.record_compute(compute_start.elapsed());

        self.plant.apply(output, self.sample_time);
        self.ticks += 1;

        if self.ticks % LOG_EVERY == 0 {
            let state = self.plant.state();
            debug!(
                tick = self.ticks,
                time = state.time,
                theta = state.theta,
                error,
                force = output,
                "control tick"
            );
        }
        true
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            model: self.plant.state(),
            paused: self.paused,
            started: self.started,
            ticks: self.ticks,
        }
    }

    pub fn publish(&self) {
        self.telemetry.publish(self.telemetry());
    }

    fn jitter(&mut self) -> Duration {
        let jitter_us = self.plant.params().jitter_us;
        if jitter_us == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.rng.gen_range(0..=jitter_us))
        }
    }

    /// Drives the loop at the controller's sample period until shutdown.
    pub fn run(mut self, shutdown: &Shutdown) -> LoopSummary {
        let _stop = shutdown.on_exit();
        info!(period = ?self.period, paused = self.paused, "control loop started");
        self.publish();

        let mut next_deadline = Instant::now();
        let mut last_start: Option<Instant> = None;

        while !shutdown.is_triggered() {
            if self.paused {
                if let Some(command) = self.commands.next_timeout(PAUSE_POLL) {
                    self.handle_command(command);
                }
                self.drain_commands();
                self.publish();
                next_deadline = Instant::now();
                last_start = None;
                continue;
            }

            let tick_start = Instant::now();
            if let Some(previous) = last_start {
                self.metrics.record_cycle_jitter(tick_start - previous);
            }
            last_start = Some(tick_start);

            self.drain_commands();
            self.tick();
            self.publish();
            self.metrics.record_tick(tick_start.elapsed(), self.period);

            next_deadline += self.period + self.jitter();
            let now = Instant::now();
            if next_deadline > now {
                sleep_until(next_deadline, shutdown);
            } else {
                // Overran; start the next period now instead of bursting.
                next_deadline = now;
            }
        }

        info!(ticks = self.ticks, "control loop stopped");
        LoopSummary {
            ticks: self.ticks,
            final_state: self.plant.state(),
        }
    }
}

/// Sleeps until `deadline` in slices of at most [`PAUSE_POLL`], returning
/// early once shutdown is triggered.
fn sleep_until(deadline: Instant, shutdown: &Shutdown) {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || shutdown.is_triggered() {
            return;
        }
        thread::sleep(remaining.min(PAUSE_POLL));
    }
}

pub fn spawn_control_thread<'scope, 'env, P>(
    scope: &'scope Scope<'scope, 'env>,
    control_loop: ControlLoop<P>,
    shutdown: Shutdown,
) -> io::Result<ScopedJoinHandle<'scope, LoopSummary>>
where
    P: Plant + Send + 'scope,
{
    thread::Builder::new()
        .name("control".to_string())
        .spawn_scoped(scope, move || control_loop.run(&shutdown))
}
