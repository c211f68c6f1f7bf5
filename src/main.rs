use clap::Parser;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

use pendulum_control::config::{load_config, SystemConfig, DEFAULT_CONFIG_PATH};
use pendulum_control::logging::init_tracing;
use pendulum_control::plant::CartPole;
use pendulum_control::{Result, RunSummary, Supervisor};

/// PID-stabilized inverted pendulum with a live administrative interface.
#[derive(Parser, Debug)]
#[command(name = "pendulum-control", version, about)]
struct Cli {
    /// TOML configuration file; built-in defaults are used if it is missing.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Address for the administrative interface, overriding `[server] bind`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long, value_name = "SECS")]
    run_for: Option<u64>,

    /// Start ticking immediately instead of waiting for `start_stop`.
    #[arg(long)]
    start_running: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = load_config(&cli.config);
    let log_filter = match &loaded {
        Ok(config) => config.runtime.log_filter.as_str(),
        Err(_) => "info",
    };
    init_tracing(log_filter);

    let mut config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!(%err, path = %cli.config.display(), "cannot load configuration");
            return ExitCode::FAILURE;
        }
    };
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(secs) = cli.run_for {
        config.runtime.run_for_secs = Some(secs);
    }
    if cli.start_running {
        config.runtime.start_paused = false;
    }

    match run(&config) {
        Ok(summary) => {
            print_report(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "pendulum control failed");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &SystemConfig) -> Result<RunSummary> {
    let supervisor = Supervisor::from_config(config)?;
    let plant = CartPole::new(config.model.clone(), config.cart.clone());
    let listener = TcpListener::bind(&config.server.bind)?;
    let run_for = config.runtime.run_for_secs.map(Duration::from_secs);

    let gains = supervisor.controller().snapshot().gains;
    info!(
        bind = %config.server.bind,
        kp = gains.kp,
        ki = gains.ki,
        kd = gains.kd,
        sample_time = config.controller.sample_time,
        paused = config.runtime.start_paused,
        "starting pendulum control"
    );

    supervisor.run(plant, listener, run_for)
}

fn print_report(summary: &RunSummary) {
    let state = &summary.control.final_state;
    let report = &summary.metrics;

    println!("===========================================");
    println!("PENDULUM CONTROL RESULTS");
    println!("===========================================");
    println!("Ticks: {}", summary.control.ticks);
    println!("Simulated time: {:.3} s", state.time);
    println!("Final angle: {:.6} rad, cart at {:.4} m", state.theta, state.x);
    println!("Final energy: {:.4} J", state.energy);
    println!(
        "Deadline Compliance: {:.2}% ({} missed)",
        report.deadline_compliance(),
        report.missed_deadlines
    );

    println!("\n=== Performance Metrics ===");
    println!("Compute P50: {:?}, P99: {:?}", report.compute_p50, report.compute_p99);
    println!("Tick P50: {:?}, P99: {:?}", report.tick_p50, report.tick_p99);
    println!("Jitter P50: {:?}, P99: {:?}", report.jitter_p50, report.jitter_p99);
    println!(
        "Admin requests: {} ({} rejected)",
        report.admin_requests, report.rejected_requests
    );
}
