//! Simulation driver module.
//!
//! Software ULP coprocessor for development and testing without an ESP32.

mod driver;
mod signal;

pub use driver::SimulatedUlp;
pub use signal::{PulseTrain, ScriptedLevels, SignalSource};

use pulse_common::counter::config::PulseUlpConfig;
use std::time::Duration;

/// Build a simulated coprocessor from the `[simulation]` table.
pub fn create_driver(config: &PulseUlpConfig, threaded: bool) -> SimulatedUlp {
    let sim = &config.simulation;
    let signal = PulseTrain::new(sim.pulse_frequency_hz, Duration::from_millis(sim.pulse_width_ms))
        .with_bounce(Duration::from_millis(sim.bounce_ms));
    let ulp = SimulatedUlp::new(config.line_gpio(), Box::new(signal))
        .with_clock_drift_ppm(sim.clock_drift_ppm);
    if threaded { ulp.threaded() } else { ulp }
}
