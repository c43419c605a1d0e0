//! # Pulse ULP Binary
//!
//! Runs a simulated battery powered pulse meter: the ULP coprocessor counts
//! meter pulses while the main CPU sleeps, the sensor publishes the pulse
//! rate on every update.
//!
//! # Usage
//!
//! ```bash
//! # Fast stepped simulation
//! pulse_ulp --config config/pulse_ulp.toml
//!
//! # Wall-clock simulation, stop with Ctrl-C
//! pulse_ulp --config config/pulse_ulp.toml --realtime -v
//! ```
//!
//! Readings are written to stdout as JSON lines, logs go to stderr.

#![deny(warnings)]

use clap::Parser;
use pulse_common::config::LogLevel;
use pulse_common::counter::config::PulseUlpConfig;
use pulse_ulp::core::{DeviceCore, Sinks};
use pulse_ulp::sink::{JsonLineSink, SensorSink, UNIT_PULSES, UNIT_PULSES_PER_MINUTE};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Pulse ULP - deep-sleep pulse counter simulation
#[derive(Parser, Debug)]
#[command(name = "pulse_ulp")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Deep-sleep pulse counter driven by the ULP coprocessor")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config/pulse_ulp.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Run in wall-clock time instead of stepping simulated time
    #[arg(long)]
    realtime: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Pulse ULP failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match PulseUlpConfig::load_validated(&args.config) {
        Ok(config) => {
            setup_tracing(&args, config.shared.log_level);
            config
        }
        Err(e) => {
            setup_tracing(&args, LogLevel::Info);
            error!("Failed to load {:?}", args.config);
            return Err(e.into());
        }
    };

    info!(
        "Pulse ULP v{} starting as '{}'",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let mut device = DeviceCore::new(config, args.realtime)?;

    let running = device.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let stats = device.run(|sensor| Sinks {
        rate: stdout_sink(&sensor.name, UNIT_PULSES_PER_MINUTE),
        total: Some(stdout_sink(&format!("{}_total", sensor.name), UNIT_PULSES)),
    })?;

    info!(
        "Pulse ULP shutdown complete ({} boots, {} updates, {} consistency faults)",
        stats.boots, stats.ticks, stats.consistency_faults
    );
    Ok(())
}

fn stdout_sink(sensor: &str, unit: &'static str) -> Box<dyn SensorSink> {
    Box::new(JsonLineSink::new(sensor, unit, std::io::stdout()))
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(configured)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
