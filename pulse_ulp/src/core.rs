//! Device core and awake/sleep loop.
//!
//! `DeviceCore` plays the main CPU of a battery powered meter: it boots, sets
//! up the sensor, ticks it for a few update intervals, then puts the CPU into
//! deep sleep while the simulated ULP keeps counting. Each boot gets a fresh
//! clock starting at zero, like the real monotonic timer.
//!
//! Time is either stepped (fast, deterministic) or real (`--realtime`, the ULP
//! runs on its own thread and the loop sleeps).

use pulse_common::config::ConfigError;
use pulse_common::counter::config::{PulseUlpConfig, SensorConfig};
use pulse_common::counter::error::StartupError;
use pulse_common::time::{Clock, ManualClock, MonotonicClock};
use pulse_common::ulp::driver::UlpDriver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::drivers::simulation::{create_driver, SimulatedUlp};
use crate::sensor::PulseCounterUlpSensor;
use crate::sink::SensorSink;

/// Longest uninterrupted sleep in realtime mode, so Ctrl-C stays responsive.
const REALTIME_SLICE: Duration = Duration::from_millis(100);

/// Errors of the device loop.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sensor setup failed on a cold boot.
    #[error(transparent)]
    Startup(#[from] StartupError),
}

/// Sinks for one boot of the sensor.
pub struct Sinks {
    /// Rate sink.
    pub rate: Box<dyn SensorSink>,
    /// Total sink, used when `[counter] total = true`.
    pub total: Option<Box<dyn SensorSink>>,
}

/// Counters of a device run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Boots performed (cold boot plus wakes).
    pub boots: u32,
    /// Sensor updates performed.
    pub ticks: u64,
    /// Deep sleeps entered.
    pub sleeps: u32,
    /// Consistency faults reported by the sensor.
    pub consistency_faults: u64,
    /// Setup warnings logged with the configuration on cold boot.
    pub config_warnings: usize,
}

/// Time source of one boot.
enum Pace {
    Stepped(ManualClock),
    Realtime,
}

/// Simulated device running the pulse counter sensor.
pub struct DeviceCore {
    config: PulseUlpConfig,
    sensor_config: SensorConfig,
    ulp: SimulatedUlp,
    realtime: bool,
    pace: Pace,
    running: Arc<AtomicBool>,
    stats: RunStats,
    /// Total kept in RTC memory across deep sleep.
    retained_total: u32,
}

impl DeviceCore {
    /// Create a device for a configuration, powered off.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the configuration is invalid.
    pub fn new(config: PulseUlpConfig, realtime: bool) -> Result<Self, CoreError> {
        config.validate()?;
        let ulp = create_driver(&config, realtime);
        Ok(Self::with_driver(config, ulp, realtime))
    }

    /// Create a device around an already built simulated coprocessor.
    pub fn with_driver(config: PulseUlpConfig, ulp: SimulatedUlp, realtime: bool) -> Self {
        let sensor_config = config.counter.sensor_config();
        info!(
            "Device '{}' created: signal on GPIO{}, counter on GPIO{}, {} mode",
            config.shared.service_name,
            ulp.line_gpio(),
            sensor_config.counter.pin,
            if realtime { "realtime" } else { "stepped" }
        );
        Self {
            config,
            sensor_config,
            ulp,
            realtime,
            pace: Pace::Realtime,
            running: Arc::new(AtomicBool::new(false)),
            stats: RunStats::default(),
            retained_total: 0,
        }
    }

    /// Run `[simulation] cycles` awake/sleep cycles, starting from a cold boot.
    ///
    /// `sinks` is called on every boot for the sinks of that boot's sensor.
    ///
    /// # Errors
    /// Returns `CoreError::Startup` if the sensor cannot start the ULP program.
    pub fn run<F>(&mut self, mut sinks: F) -> Result<RunStats, CoreError>
    where
        F: FnMut(&SensorConfig) -> Sinks,
    {
        let sim = self.config.simulation.clone();
        let update_interval = self.sensor_config.update_interval;
        let sleep = Duration::from_millis(sim.sleep_ms);

        info!(
            "Running {} cycles: {} updates every {:?}, then {:?} deep sleep",
            sim.cycles, sim.awake_ticks, update_interval, sleep
        );
        self.running.store(true, Ordering::SeqCst);

        for cycle in 0..sim.cycles {
            if !self.is_running() {
                break;
            }
            debug!("Cycle {}: boot, wakeup cause {:?}", cycle, self.ulp.wakeup_cause());

            let mut sensor = self.boot(&mut sinks);
            sensor.setup(&mut self.ulp)?;
            if cycle == 0 {
                self.stats.config_warnings = sensor.dump_config();
            }
            if cycle > 0 && self.config.counter.total {
                sensor.set_total_pulses(self.retained_total);
            }
            self.tick(&mut sensor);

            for _ in 0..sim.awake_ticks {
                self.pass(update_interval);
                if !self.is_running() {
                    break;
                }
                self.tick(&mut sensor);
            }
            self.stats.consistency_faults += sensor.consistency_faults();
            self.retained_total = sensor.total_pulses();
            drop(sensor);

            if !self.is_running() {
                break;
            }
            info!("Entering deep sleep for {:?}", sleep);
            self.ulp.deep_sleep();
            self.stats.sleeps += 1;
            self.pass(sleep);
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            "Device stopped after {} boots, {} updates, {} sleeps",
            self.stats.boots, self.stats.ticks, self.stats.sleeps
        );
        Ok(self.stats)
    }

    /// Request the loop to stop.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Simulated coprocessor.
    pub fn ulp(&self) -> &SimulatedUlp {
        &self.ulp
    }

    /// Mutable access to the simulated coprocessor.
    pub fn ulp_mut(&mut self) -> &mut SimulatedUlp {
        &mut self.ulp
    }

    /// Counters so far.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// New boot: fresh clock and a fresh sensor instance.
    fn boot<F>(&mut self, sinks: &mut F) -> PulseCounterUlpSensor<Box<dyn Clock + Send>>
    where
        F: FnMut(&SensorConfig) -> Sinks,
    {
        self.stats.boots += 1;
        let clock: Box<dyn Clock + Send> = if self.realtime {
            self.pace = Pace::Realtime;
            Box::new(MonotonicClock::new())
        } else {
            let clock = ManualClock::new();
            self.pace = Pace::Stepped(clock.clone());
            Box::new(clock)
        };

        let Sinks { rate, total } = sinks(&self.sensor_config);
        let sensor = PulseCounterUlpSensor::new(self.sensor_config.clone(), clock, rate);
        match total {
            Some(total) if self.config.counter.total => sensor.with_total_sink(total),
            _ => sensor,
        }
    }

    fn tick(&mut self, sensor: &mut PulseCounterUlpSensor<Box<dyn Clock + Send>>) {
        sensor.update();
        self.stats.ticks += 1;
    }

    /// Let `duration` pass on the device.
    fn pass(&mut self, duration: Duration) {
        match &self.pace {
            Pace::Stepped(clock) => {
                let iterations = self.ulp.advance(duration);
                clock.advance(duration);
                debug!("{:?} passed, {} ULP wakeups", duration, iterations);
            }
            Pace::Realtime => {
                let mut remaining = duration;
                while !remaining.is_zero() && self.is_running() {
                    let slice = remaining.min(REALTIME_SLICE);
                    thread::sleep(slice);
                    remaining -= slice;
                }
            }
        }
    }
}
