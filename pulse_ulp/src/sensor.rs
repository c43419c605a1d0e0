//! Pulse rate sensor on top of the ULP counter.
//!
//! `PulseCounterUlpSensor` turns the raw counters of [`UlpProgram`] into a
//! rate in pulses per minute, optionally with a running total.
//!
//! # Timekeeping Across Deep Sleep
//!
//! The main CPU clock restarts at zero on every boot, the ULP keeps counting.
//! After a wake the time of the last snapshot is reconstructed from the ULP's
//! own iteration count:
//!
//! ```text
//! last_sample_time = now - run_count × mean_exec_time
//! ```
//!
//! Each awake tick recalibrates `mean_exec_time = interval / run_count`, so a
//! drifting coprocessor clock is corrected before the next sleep.

use pulse_common::counter::config::SensorConfig;
use pulse_common::counter::error::StartupError;
use pulse_common::consts::US_PER_MINUTE;
use pulse_common::time::{Clock, Timestamp};
use pulse_common::ulp::driver::UlpDriver;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::program::UlpProgram;
use crate::sink::SensorSink;

/// Sampling state of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingState {
    /// Cold boot: the first tick only establishes a timestamp.
    Uninitialized,
    /// A previous snapshot time is known.
    Running {
        /// Time of the previous snapshot, possibly before this boot.
        last_sample_time: Timestamp,
    },
}

/// Rate of `edges` over `interval` in pulses per minute, `None` for an empty
/// interval.
pub fn rate_per_minute(edges: i32, interval: Duration) -> Option<f32> {
    let micros = interval.as_micros();
    if micros == 0 {
        return None;
    }
    Some((edges as f64 * US_PER_MINUTE as f64 / micros as f64) as f32)
}

/// Pulse rate sensor backed by the ULP counter.
pub struct PulseCounterUlpSensor<C: Clock> {
    config: SensorConfig,
    clock: C,
    rate_sink: Box<dyn SensorSink>,
    total_sink: Option<Box<dyn SensorSink>>,
    program: Option<UlpProgram>,
    sampling: SamplingState,
    total: u32,
    consistency_faults: u64,
    failed: bool,
}

impl<C: Clock> PulseCounterUlpSensor<C> {
    /// Sensor publishing its rate to `rate_sink`. Nothing runs until `setup`.
    pub fn new(config: SensorConfig, clock: C, rate_sink: Box<dyn SensorSink>) -> Self {
        Self {
            config,
            clock,
            rate_sink,
            total_sink: None,
            program: None,
            sampling: SamplingState::Uninitialized,
            total: 0,
            consistency_faults: 0,
            failed: false,
        }
    }

    /// Also publish a running total of counted edges.
    pub fn with_total_sink(mut self, sink: Box<dyn SensorSink>) -> Self {
        self.total_sink = Some(sink);
        self
    }

    /// Start or attach to the ULP program, depending on why the CPU runs.
    ///
    /// # Errors
    /// Propagates the `StartupError` of a failed cold-boot start. The sensor
    /// is then marked failed and `update()` does nothing.
    pub fn setup<D>(&mut self, driver: &mut D) -> Result<(), StartupError>
    where
        D: UlpDriver + ?Sized,
    {
        info!("Setting up pulse counter '{}'", self.config.name);
        let cause = driver.wakeup_cause();

        if cause.is_cold_boot() {
            debug!("Did not wake up from sleep, setting up the ULP program");
            match UlpProgram::start(&self.config.counter, driver) {
                Ok(program) => {
                    self.program = Some(program);
                    self.sampling = SamplingState::Uninitialized;
                }
                Err(e) => {
                    error!("Pulse counter '{}' failed: {}", self.config.name, e);
                    self.failed = true;
                    return Err(e);
                }
            }
        } else {
            debug!("Woke up from sleep ({:?}), skipping set-up of ULP program", cause);
            let program = UlpProgram::resume(&*driver);
            let state = program.peek_state();
            let last_sample_time = self.clock.now() - state.elapsed_estimate();
            debug!(
                "ULP ran {} iterations of {:?} since the last snapshot, last sample at {} µs",
                state.run_count,
                state.mean_exec_time,
                last_sample_time.as_micros()
            );
            self.sampling = SamplingState::Running { last_sample_time };
            self.program = Some(program);
        }
        Ok(())
    }

    /// Snapshot the counters and publish the rate since the previous tick.
    pub fn update(&mut self) {
        let Some(program) = &self.program else {
            return;
        };
        let raw = program.pop_state();
        let now = self.clock.now();
        let counter = &self.config.counter;
        let edges = raw.edges(counter.rising_edge_mode, counter.falling_edge_mode);

        match self.sampling {
            SamplingState::Uninitialized => {
                debug!("First snapshot of '{}', establishing timestamp", self.config.name);
            }
            SamplingState::Running { last_sample_time } => {
                let interval = now.saturating_duration_since(last_sample_time);
                if interval.is_zero() {
                    debug!("No time passed since the last snapshot, skipping rate");
                } else {
                    if raw.run_count > 0 {
                        program.set_mean_exec_time(interval / raw.run_count as u32);
                    }
                    if raw.is_inconsistent() {
                        self.consistency_faults += 1;
                        warn!(
                            "Inconsistent ULP state: {} edges without a single run, skipping rate",
                            raw.edge_count
                        );
                    } else if let Some(rate) = rate_per_minute(edges, interval) {
                        info!("Retrieved counter: {:.2} pulses/min", rate);
                        self.rate_sink.publish(rate);
                    }
                }
            }
        }

        if let Some(sink) = self.total_sink.as_mut() {
            self.total = self.total.wrapping_add_signed(edges);
            debug!("Total pulses of '{}': {}", self.config.name, self.total);
            sink.publish(self.total as f32);
        }
        self.sampling = SamplingState::Running {
            last_sample_time: now,
        };
    }

    /// Overwrite the running total and publish it.
    pub fn set_total_pulses(&mut self, pulses: u32) {
        self.total = pulses;
        if let Some(sink) = self.total_sink.as_mut() {
            info!("Total pulses of '{}' set to {}", self.config.name, pulses);
            sink.publish(pulses as f32);
        }
    }

    /// Log the configuration. Returns the number of setup warnings logged,
    /// so call it after `setup`.
    pub fn dump_config(&self) -> usize {
        let counter = &self.config.counter;
        info!("Pulse counter '{}':", self.config.name);
        info!("  Pin: GPIO{}", counter.pin);
        info!("  Rising Edge: {}", counter.rising_edge_mode);
        info!("  Falling Edge: {}", counter.falling_edge_mode);
        info!(
            "  Debounce: {} samples (minimum pulse width {:?})",
            counter.debounce_threshold,
            counter.min_pulse_width()
        );
        info!("  Sample Period: {:?}", counter.sample_period);
        info!("  Update Interval: {:?}", self.config.update_interval);
        if self.total_sink.is_some() {
            info!("  Total: enabled");
        }
        let warnings = self.program.as_ref().map_or(&[][..], |p| p.warnings());
        for warning in warnings {
            warn!("  {}", warning);
        }
        warnings.len()
    }

    /// Whether setup failed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Ticks skipped because the counters were inconsistent.
    pub fn consistency_faults(&self) -> u64 {
        self.consistency_faults
    }

    /// Running total of counted edges.
    pub fn total_pulses(&self) -> u32 {
        self.total
    }

    /// Current sampling state.
    pub fn sampling_state(&self) -> SamplingState {
        self.sampling
    }

    /// The attached program, once set up.
    pub fn program(&self) -> Option<&UlpProgram> {
        self.program.as_ref()
    }

    /// Sensor configuration.
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }
}
