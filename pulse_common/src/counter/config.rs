//! Counter, sensor and application configuration.
//!
//! - `CounterConfig` - Immutable settings handed to `UlpProgram::start`
//! - `SensorConfig` - Counter settings plus sensor naming and polling
//! - `PulseUlpConfig` - Application configuration loaded from TOML
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "water-meter-01"
//!
//! [counter]
//! name = "water_flow"
//! pin = 33
//! debounce = 3
//! sample_period_us = 20000
//! update_interval_ms = 60000
//! total = true
//!
//! [counter.count_mode]
//! rising_edge = "increment"
//! falling_edge = "disable"
//!
//! [simulation]
//! pulse_frequency_hz = 0.75
//! pulse_width_ms = 250
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use super::mode::CountMode;
use crate::config::{ConfigError, ConfigLoader, SharedConfig};
use crate::consts::{
    DEFAULT_DEBOUNCE, DEFAULT_SAMPLE_PERIOD_US, DEFAULT_SENSOR_NAME, DEFAULT_UPDATE_INTERVAL_MS,
};

fn default_name() -> String {
    DEFAULT_SENSOR_NAME.to_string()
}

fn default_debounce() -> u16 {
    DEFAULT_DEBOUNCE
}

fn default_sample_period_us() -> u32 {
    DEFAULT_SAMPLE_PERIOD_US
}

fn default_update_interval_ms() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MS
}

/// Settings of one counting session, fixed from cold boot on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterConfig {
    /// GPIO number of the input line.
    pub pin: u8,
    /// Policy for rising edges.
    pub rising_edge_mode: CountMode,
    /// Policy for falling edges.
    pub falling_edge_mode: CountMode,
    /// Extra consistent samples required before an edge is accepted.
    pub debounce_threshold: u16,
    /// ULP wakeup period.
    pub sample_period: Duration,
}

impl CounterConfig {
    /// Shortest pulse the debounce filter lets through.
    pub fn min_pulse_width(&self) -> Duration {
        self.sample_period * (self.debounce_threshold as u32 + 1)
    }
}

/// Configuration of the rate sensor built on top of the counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    /// Name used in logs and published readings.
    pub name: String,
    /// Counter settings used on cold boot.
    pub counter: CounterConfig,
    /// Polling interval of `update()`.
    pub update_interval: Duration,
}

/// Edge policies as written in TOML.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CountModeSection {
    /// Policy for rising edges.
    pub rising_edge: CountMode,
    /// Policy for falling edges.
    pub falling_edge: CountMode,
}

impl Default for CountModeSection {
    fn default() -> Self {
        Self {
            rising_edge: CountMode::Increment,
            falling_edge: CountMode::Disable,
        }
    }
}

/// `[counter]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterSection {
    /// Sensor name.
    #[serde(default = "default_name")]
    pub name: String,
    /// GPIO number of the input line.
    pub pin: u8,
    /// Edge policies.
    #[serde(default)]
    pub count_mode: CountModeSection,
    /// Debounce threshold in samples.
    #[serde(default = "default_debounce")]
    pub debounce: u16,
    /// ULP wakeup period in microseconds.
    #[serde(default = "default_sample_period_us")]
    pub sample_period_us: u32,
    /// Sensor update interval in milliseconds.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Publish a running total next to the rate.
    #[serde(default)]
    pub total: bool,
}

impl CounterSection {
    /// Validate the counter table.
    ///
    /// # Validation Rules
    /// 1. Not both edge modes `disable` (nothing would ever be counted)
    /// 2. `sample_period_us` > 0
    /// 3. `update_interval_ms` > 0
    /// 4. `name` not empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count_mode.rising_edge == CountMode::Disable
            && self.count_mode.falling_edge == CountMode::Disable
        {
            return Err(ConfigError::ValidationError(
                "Can't set both count modes to disable! This means no counting occurs at all!"
                    .to_string(),
            ));
        }
        if self.sample_period_us == 0 {
            return Err(ConfigError::ValidationError(
                "sample_period_us must be greater than 0".to_string(),
            ));
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "update_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "counter name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Counter settings for `UlpProgram::start`.
    pub fn counter_config(&self) -> CounterConfig {
        CounterConfig {
            pin: self.pin,
            rising_edge_mode: self.count_mode.rising_edge,
            falling_edge_mode: self.count_mode.falling_edge,
            debounce_threshold: self.debounce,
            sample_period: Duration::from_micros(self.sample_period_us as u64),
        }
    }

    /// Sensor settings.
    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            name: self.name.clone(),
            counter: self.counter_config(),
            update_interval: Duration::from_millis(self.update_interval_ms),
        }
    }
}

/// `[simulation]` table: the simulated input line and power cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    /// GPIO the simulated signal is wired to. Defaults to the counter pin.
    pub line_gpio: Option<u8>,
    /// Pulse frequency of the simulated meter.
    pub pulse_frequency_hz: f64,
    /// High time of each pulse in milliseconds.
    pub pulse_width_ms: u64,
    /// Contact bounce after each edge in milliseconds.
    pub bounce_ms: u64,
    /// ULP RC oscillator error in parts per million (positive = slow).
    pub clock_drift_ppm: i32,
    /// Sensor updates per awake window, after the immediate one on boot.
    pub awake_ticks: u32,
    /// Deep sleep duration in milliseconds.
    pub sleep_ms: u64,
    /// Number of awake/sleep cycles to run.
    pub cycles: u32,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            line_gpio: None,
            pulse_frequency_hz: 0.75,
            pulse_width_ms: 250,
            bounce_ms: 0,
            clock_drift_ppm: 0,
            awake_ticks: 1,
            sleep_ms: 300_000,
            cycles: 3,
        }
    }
}

impl SimulationSection {
    /// Validate the simulation table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pulse_frequency_hz.is_finite() || self.pulse_frequency_hz < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "pulse_frequency_hz must be a non-negative number, got {}",
                self.pulse_frequency_hz
            )));
        }
        if self.pulse_frequency_hz > 0.0 {
            let period_ms = 1000.0 / self.pulse_frequency_hz;
            if self.pulse_width_ms as f64 >= period_ms {
                return Err(ConfigError::ValidationError(format!(
                    "pulse_width_ms ({}) must be shorter than the pulse period ({:.1} ms)",
                    self.pulse_width_ms, period_ms
                )));
            }
        }
        if self.clock_drift_ppm <= -1_000_000 {
            return Err(ConfigError::ValidationError(
                "clock_drift_ppm must be greater than -1000000".to_string(),
            ));
        }
        Ok(())
    }
}

/// Application configuration of the `pulse_ulp` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PulseUlpConfig {
    /// Logging and instance naming.
    pub shared: SharedConfig,
    /// Counter and sensor settings.
    pub counter: CounterSection,
    /// Simulated line and power cycle.
    #[serde(default)]
    pub simulation: SimulationSection,
}

impl PulseUlpConfig {
    /// Validate all sections.
    ///
    /// A deep sleep that overflows the 16-bit run counter is accepted with a
    /// warning: the wake time reconstructed from it will be wrong.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.counter.validate()?;
        self.simulation.validate()?;
        if self.sleep_wraps_run_count() {
            warn!(
                "sleep_ms = {} is {} ULP runs at {} us, more than the run counter holds ({}); \
                 time since the last update will be underestimated after a wake",
                self.simulation.sleep_ms,
                self.runs_per_sleep(),
                self.counter.sample_period_us,
                u16::MAX
            );
        }
        Ok(())
    }

    /// ULP runs during one deep sleep.
    pub fn runs_per_sleep(&self) -> u64 {
        match self.counter.sample_period_us {
            0 => 0,
            period => self.simulation.sleep_ms.saturating_mul(1000) / u64::from(period),
        }
    }

    /// Whether one deep sleep overflows the 16-bit run counter.
    pub fn sleep_wraps_run_count(&self) -> bool {
        self.runs_per_sleep() > u64::from(u16::MAX)
    }

    /// Load a TOML file and validate it.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// GPIO the simulated signal drives.
    pub fn line_gpio(&self) -> u8 {
        self.simulation.line_gpio.unwrap_or(self.counter.pin)
    }
}
