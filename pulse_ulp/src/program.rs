//! Main-CPU side of the ULP counting program.
//!
//! `UlpProgram` owns no counting logic. It initializes the shared variable
//! block on cold boot, attaches to it after a wake, and snapshots it.
//!
//! # Entry Points
//!
//! - [`UlpProgram::start`] - cold boot: load, initialize, run
//! - [`UlpProgram::resume`] - wake from deep sleep: attach, touch nothing
//!
//! Calling `resume` on a cold boot would read uninitialized RTC memory, so the
//! caller picks the entry point from `UlpDriver::wakeup_cause()`.

use pulse_common::consts::{INVALID_RTC_IO, ULP_WORD_MASK};
use pulse_common::counter::config::CounterConfig;
use pulse_common::counter::error::{ConfigWarning, StartupError};
use pulse_common::counter::state::State;
use pulse_common::ulp::driver::UlpDriver;
use pulse_common::ulp::layout::{lower16, store16, RtcSlowMemory};
use pulse_common::ulp::program::PULSE_COUNTER_PROGRAM;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Handle to the running counting program.
#[derive(Debug, Clone)]
pub struct UlpProgram {
    memory: Arc<RtcSlowMemory>,
    warnings: Vec<ConfigWarning>,
}

impl UlpProgram {
    /// Install and start the counting program (cold boot only).
    ///
    /// A pin outside the RTC domain does not abort the start: it is logged,
    /// recorded in [`UlpProgram::warnings`] and the program samples an
    /// unconnected line.
    ///
    /// # Errors
    /// - `StartupError::LoadFailed` if the image cannot be installed
    /// - `StartupError::RunFailed` if the wakeup timer or the program cannot
    ///   be started
    pub fn start<D>(config: &CounterConfig, driver: &mut D) -> Result<Self, StartupError>
    where
        D: UlpDriver + ?Sized,
    {
        info!(
            "Starting ULP program '{}' on {} driver",
            PULSE_COUNTER_PROGRAM.name,
            driver.name()
        );

        driver.load_program(&PULSE_COUNTER_PROGRAM).map_err(|e| {
            error!("Loading ULP binary failed: {}", e);
            StartupError::LoadFailed(e)
        })?;

        let mut warnings = Vec::new();
        let io_number = match driver.rtc_io_number(config.pin) {
            Some(io) => io as u16,
            None => {
                let warning = ConfigWarning::InvalidPin(config.pin);
                error!("{}", warning);
                warnings.push(warning);
                INVALID_RTC_IO
            }
        };

        let memory = driver.rtc_memory();
        let vars = memory.variables();
        store16(&vars.edge_count, 0);
        store16(&vars.run_count, 0);
        store16(&vars.debounce_counter, config.debounce_threshold);
        store16(&vars.debounce_max_count, config.debounce_threshold);
        store16(&vars.next_edge, 0);
        store16(&vars.io_number, io_number);
        vars.rising_edge_mode
            .store(config.rising_edge_mode.as_word(), Ordering::Release);
        vars.falling_edge_mode
            .store(config.falling_edge_mode.as_word(), Ordering::Release);
        vars.mean_exec_time
            .store(duration_to_word(config.sample_period), Ordering::Release);

        if warnings.is_empty() {
            if let Err(e) = driver.configure_rtc_input(config.pin) {
                warn!("Holding GPIO{} as RTC input failed: {}", config.pin, e);
            }
        }

        driver.set_wakeup_period(config.sample_period).map_err(|e| {
            error!("Setting ULP wakeup period failed: {}", e);
            StartupError::RunFailed(e)
        })?;
        driver.run(PULSE_COUNTER_PROGRAM.entry).map_err(|e| {
            error!("Starting ULP program failed: {}", e);
            StartupError::RunFailed(e)
        })?;

        debug!(
            "ULP sampling RTC IO {:#06x} every {:?}, minimum pulse width {:?}",
            io_number,
            config.sample_period,
            config.min_pulse_width()
        );
        Ok(Self { memory, warnings })
    }

    /// Attach to a program that kept running through deep sleep.
    pub fn resume<D>(driver: &D) -> Self
    where
        D: UlpDriver + ?Sized,
    {
        debug!("Attaching to running ULP program");
        Self {
            memory: driver.rtc_memory(),
            warnings: Vec::new(),
        }
    }

    /// Read the counters without resetting them.
    pub fn peek_state(&self) -> State {
        let vars = self.memory.variables();
        State {
            edge_count: lower16(&vars.edge_count),
            run_count: lower16(&vars.run_count),
            mean_exec_time: self.mean_exec_time(),
        }
    }

    /// Read the counters and start a new counting epoch.
    ///
    /// Each counter word is swapped with zero, so an iteration that lands in
    /// between is attributed to the next epoch rather than lost.
    pub fn pop_state(&self) -> State {
        let vars = self.memory.variables();
        let edge_count = (vars.edge_count.swap(0, Ordering::AcqRel) & ULP_WORD_MASK) as u16;
        let run_count = (vars.run_count.swap(0, Ordering::AcqRel) & ULP_WORD_MASK) as u16;
        let state = State {
            edge_count,
            run_count,
            mean_exec_time: self.mean_exec_time(),
        };
        debug!(
            "Popped ULP state: edge_count={}, run_count={}, mean_exec_time={:?}",
            state.edge_count, state.run_count, state.mean_exec_time
        );
        state
    }

    /// Store a new estimate of the time one iteration takes.
    pub fn set_mean_exec_time(&self, mean_exec_time: Duration) {
        self.memory
            .variables()
            .mean_exec_time
            .store(duration_to_word(mean_exec_time), Ordering::Release);
    }

    /// Current estimate of the time one iteration takes.
    pub fn mean_exec_time(&self) -> Duration {
        let micros = self.memory.variables().mean_exec_time.load(Ordering::Acquire);
        Duration::from_micros(micros as u64)
    }

    /// Non-fatal problems found by `start`.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }
}

/// Microseconds as stored in the `mean_exec_time` word, saturating.
fn duration_to_word(duration: Duration) -> u32 {
    u32::try_from(duration.as_micros()).unwrap_or(u32::MAX)
}
