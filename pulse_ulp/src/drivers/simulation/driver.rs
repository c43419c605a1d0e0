//! Simulated ULP coprocessor and RTC domain.
//!
//! `SimulatedUlp` implements `UlpDriver` in software. It owns the RTC slow
//! memory, executes `counting_step()` once per wakeup period against a
//! `SignalSource`, and models the main CPU power states:
//!
//! - `deep_sleep()` keeps RTC memory and the running program; the next boot
//!   reports a timer wakeup
//! - `software_reset()` keeps RTC memory and the running program; the next
//!   boot reports no wakeup cause
//! - `power_on_reset()` stops the program and zeroes RTC memory
//!
//! Time advances either in explicit steps (`advance()`, deterministic, used by
//! tests and the fast CLI mode) or on a background thread started by `run()`
//! when the driver was built with `threaded()`.

use parking_lot::Mutex;
use pulse_common::consts::ULP_RESERVED_MEM;
use pulse_common::ulp::driver::{UlpDriver, UlpError, WakeupCause};
use pulse_common::ulp::layout::{lower16, RtcSlowMemory};
use pulse_common::ulp::program::{counting_step, ProgramImage};
use pulse_common::ulp::rtc_io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::signal::SignalSource;

/// Longest wakeup period the RTC timer register accepts.
const MAX_WAKEUP_PERIOD: Duration = Duration::from_micros(u32::MAX as u64);

/// State the coprocessor reads on every wakeup.
struct Line {
    memory: Arc<RtcSlowMemory>,
    signal: Mutex<Box<dyn SignalSource>>,
    /// RTC IO the signal is wired to, `None` if the wire is on a non-RTC pin.
    rtc_io: Option<u8>,
    iterations: AtomicU64,
}

impl Line {
    /// One coprocessor wakeup at `at` since power-on.
    fn wakeup(&self, at: Duration) {
        let vars = self.memory.variables();
        let iteration = self.iterations.fetch_add(1, Ordering::AcqRel);
        let sampled = lower16(&vars.io_number);
        let level = match self.rtc_io {
            Some(io) if io as u16 == sampled => self.signal.lock().level_at(at, iteration),
            // Unrouted pads read low.
            _ => false,
        };
        if let Some(edge) = counting_step(vars, level) {
            trace!("ULP accepted {:?} edge at {:?}", edge, at);
        }
    }
}

/// Background execution of the program in wall time.
struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Software ULP coprocessor implementing the `UlpDriver` trait.
pub struct SimulatedUlp {
    line: Arc<Line>,
    line_gpio: u8,
    wakeup_cause: WakeupCause,
    loaded: Option<ProgramImage>,
    wakeup_period: Duration,
    clock_drift_ppm: i32,
    held_inputs: Vec<u8>,
    running: bool,
    threaded: bool,
    worker: Option<Worker>,
    /// Stepped mode: time since power-on.
    elapsed: Duration,
    /// Stepped mode: time of the next coprocessor wakeup.
    next_wakeup: Duration,
    /// Wall-clock origin of the threaded mode.
    powered_at: Instant,
    fail_load: Option<UlpError>,
    fail_run: Option<UlpError>,
}

impl SimulatedUlp {
    /// Create a powered-off coprocessor whose input `line_gpio` carries `signal`.
    pub fn new(line_gpio: u8, signal: Box<dyn SignalSource>) -> Self {
        let rtc_io = rtc_io::rtc_io_number(line_gpio);
        if rtc_io.is_none() {
            warn!(
                "Simulated signal is wired to GPIO{}, which has no RTC IO; the ULP will read low",
                line_gpio
            );
        }
        Self {
            line: Arc::new(Line {
                memory: Arc::new(RtcSlowMemory::new()),
                signal: Mutex::new(signal),
                rtc_io,
                iterations: AtomicU64::new(0),
            }),
            line_gpio,
            wakeup_cause: WakeupCause::Undefined,
            loaded: None,
            wakeup_period: Duration::ZERO,
            clock_drift_ppm: 0,
            held_inputs: Vec::new(),
            running: false,
            threaded: false,
            worker: None,
            elapsed: Duration::ZERO,
            next_wakeup: Duration::ZERO,
            powered_at: Instant::now(),
            fail_load: None,
            fail_run: None,
        }
    }

    /// Run the program on a background thread in wall time instead of
    /// stepping it with `advance()`.
    pub fn threaded(mut self) -> Self {
        self.threaded = true;
        self
    }

    /// Offset of the ULP RC oscillator from nominal, positive = slow.
    pub fn with_clock_drift_ppm(mut self, ppm: i32) -> Self {
        self.clock_drift_ppm = ppm;
        self
    }

    /// Make the next `load_program()` fail with `error`.
    pub fn fail_next_load(&mut self, error: UlpError) {
        self.fail_load = Some(error);
    }

    /// Make the next `run()` fail with `error`.
    pub fn fail_next_run(&mut self, error: UlpError) {
        self.fail_run = Some(error);
    }

    /// GPIO the simulated signal is wired to.
    pub fn line_gpio(&self) -> u8 {
        self.line_gpio
    }

    /// Whether the program is executing.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Loaded image, if any.
    pub fn loaded_program(&self) -> Option<&ProgramImage> {
        self.loaded.as_ref()
    }

    /// GPIOs routed to the RTC domain and held.
    pub fn held_inputs(&self) -> &[u8] {
        &self.held_inputs
    }

    /// Wakeups executed since power-on.
    pub fn iterations(&self) -> u64 {
        self.line.iterations.load(Ordering::Acquire)
    }

    /// Effective wakeup period including oscillator drift.
    pub fn effective_period(&self) -> Duration {
        let nominal = self.wakeup_period.as_nanos() as i128;
        let scaled = nominal * (1_000_000 + self.clock_drift_ppm as i128) / 1_000_000;
        Duration::from_nanos(scaled.clamp(1, u64::MAX as i128) as u64)
    }

    /// Step simulated time forward, executing every wakeup that falls in it.
    ///
    /// Returns the number of wakeups executed. Does nothing to the program
    /// when it runs threaded.
    pub fn advance(&mut self, by: Duration) -> u64 {
        let target = self.elapsed + by;
        let mut executed = 0;
        if self.running && self.worker.is_none() {
            let period = self.effective_period();
            while self.next_wakeup <= target {
                self.line.wakeup(self.next_wakeup);
                self.next_wakeup += period;
                executed += 1;
            }
        }
        self.elapsed = target;
        executed
    }

    /// Main CPU enters deep sleep. The next boot reports a timer wakeup.
    pub fn deep_sleep(&mut self) {
        debug!("Main CPU entering deep sleep, ULP running: {}", self.running);
        self.wakeup_cause = WakeupCause::Timer;
    }

    /// Main CPU reset without losing RTC power.
    pub fn software_reset(&mut self) {
        debug!("Software reset, RTC domain keeps power");
        self.wakeup_cause = WakeupCause::Undefined;
    }

    /// Remove power: stop the program and zero RTC slow memory.
    pub fn power_on_reset(&mut self) {
        info!("Power-on reset of simulated ULP");
        self.stop_worker();
        self.running = false;
        self.loaded = None;
        self.held_inputs.clear();
        self.wakeup_period = Duration::ZERO;
        self.wakeup_cause = WakeupCause::Undefined;
        self.line.memory.power_on_reset();
        self.line.iterations.store(0, Ordering::Release);
        self.elapsed = Duration::ZERO;
        self.next_wakeup = Duration::ZERO;
        self.powered_at = Instant::now();
    }

    fn spawn_worker(&mut self) {
        let stop = Arc::new(AtomicBool::new(false));
        let line = Arc::clone(&self.line);
        let period = self.effective_period();
        let origin = self.powered_at;
        let stop_flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let mut next = Instant::now() + period;
            while !stop_flag.load(Ordering::Acquire) {
                let now = Instant::now();
                if now < next {
                    thread::sleep(next - now);
                    continue;
                }
                line.wakeup(next.saturating_duration_since(origin));
                next += period;
            }
        });
        self.worker = Some(Worker { stop, handle });
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Release);
            if worker.handle.join().is_err() {
                warn!("Simulated ULP thread panicked");
            }
        }
    }
}

impl UlpDriver for SimulatedUlp {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn wakeup_cause(&self) -> WakeupCause {
        self.wakeup_cause
    }

    fn rtc_memory(&self) -> Arc<RtcSlowMemory> {
        Arc::clone(&self.line.memory)
    }

    fn load_program(&mut self, image: &ProgramImage) -> Result<(), UlpError> {
        if let Some(err) = self.fail_load.take() {
            return Err(err);
        }
        image.validate()?;
        debug!(
            "Loaded ULP program '{}' ({} words, entry {})",
            image.name, image.text_words, image.entry
        );
        self.loaded = Some(*image);
        Ok(())
    }

    fn configure_rtc_input(&mut self, gpio: u8) -> Result<(), UlpError> {
        if !rtc_io::is_valid_rtc_gpio(gpio) {
            return Err(UlpError::NotRtcIo(gpio));
        }
        if !self.held_inputs.contains(&gpio) {
            self.held_inputs.push(gpio);
        }
        Ok(())
    }

    fn set_wakeup_period(&mut self, period: Duration) -> Result<(), UlpError> {
        if period.is_zero() || period > MAX_WAKEUP_PERIOD {
            return Err(UlpError::InvalidPeriod(period));
        }
        self.wakeup_period = period;
        Ok(())
    }

    fn run(&mut self, entry: u32) -> Result<(), UlpError> {
        if let Some(err) = self.fail_run.take() {
            return Err(err);
        }
        let image = self.loaded.ok_or(UlpError::NotLoaded)?;
        if entry < image.entry || entry as usize * 4 >= ULP_RESERVED_MEM {
            return Err(UlpError::InvalidEntry(entry));
        }
        if self.wakeup_period.is_zero() {
            return Err(UlpError::InvalidPeriod(self.wakeup_period));
        }

        self.stop_worker();
        self.line.iterations.store(0, Ordering::Release);
        self.running = true;
        if self.threaded {
            self.spawn_worker();
        } else {
            self.next_wakeup = self.elapsed + self.effective_period();
        }
        info!(
            "ULP program running every {:?} (effective {:?})",
            self.wakeup_period,
            self.effective_period()
        );
        Ok(())
    }
}

impl Drop for SimulatedUlp {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::signal::ScriptedLevels;
    use pulse_common::ulp::layout::store16;
    use pulse_common::ulp::program::PULSE_COUNTER_PROGRAM;

    fn driver(levels: Vec<bool>) -> SimulatedUlp {
        SimulatedUlp::new(33, Box::new(ScriptedLevels::new(levels)))
    }

    fn started(ulp: &mut SimulatedUlp, period: Duration) {
        ulp.load_program(&PULSE_COUNTER_PROGRAM).unwrap();
        let vars = ulp.rtc_memory();
        store16(&vars.variables().io_number, 8);
        store16(&vars.variables().rising_edge_mode, 1);
        ulp.set_wakeup_period(period).unwrap();
        ulp.run(PULSE_COUNTER_PROGRAM.entry).unwrap();
    }

    #[test]
    fn run_requires_loaded_program() {
        let mut ulp = driver(vec![]);
        ulp.set_wakeup_period(Duration::from_millis(20)).unwrap();
        assert_eq!(ulp.run(9), Err(UlpError::NotLoaded));
    }

    #[test]
    fn run_rejects_entry_outside_program() {
        let mut ulp = driver(vec![]);
        ulp.load_program(&PULSE_COUNTER_PROGRAM).unwrap();
        ulp.set_wakeup_period(Duration::from_millis(20)).unwrap();
        assert_eq!(ulp.run(0), Err(UlpError::InvalidEntry(0)));
        assert_eq!(ulp.run(4096), Err(UlpError::InvalidEntry(4096)));
    }

    #[test]
    fn zero_period_rejected() {
        let mut ulp = driver(vec![]);
        assert_eq!(
            ulp.set_wakeup_period(Duration::ZERO),
            Err(UlpError::InvalidPeriod(Duration::ZERO))
        );
    }

    #[test]
    fn non_rtc_gpio_cannot_be_held() {
        let mut ulp = driver(vec![]);
        assert_eq!(ulp.configure_rtc_input(5), Err(UlpError::NotRtcIo(5)));
        assert!(ulp.configure_rtc_input(33).is_ok());
        assert_eq!(ulp.held_inputs(), &[33]);
    }

    #[test]
    fn advance_executes_one_wakeup_per_period() {
        let mut ulp = driver(vec![]);
        started(&mut ulp, Duration::from_millis(20));
        assert_eq!(ulp.advance(Duration::from_millis(19)), 0);
        assert_eq!(ulp.advance(Duration::from_millis(1)), 1);
        assert_eq!(ulp.advance(Duration::from_secs(1)), 50);
        assert_eq!(lower16(&ulp.rtc_memory().variables().run_count), 51);
    }

    #[test]
    fn slow_oscillator_wakes_less_often() {
        let mut ulp = driver(vec![]).with_clock_drift_ppm(250_000);
        started(&mut ulp, Duration::from_millis(20));
        assert_eq!(ulp.effective_period(), Duration::from_millis(25));
        assert_eq!(ulp.advance(Duration::from_secs(1)), 40);
    }

    #[test]
    fn line_is_sampled_on_matching_io_only() {
        let mut ulp = driver(vec![true; 8]);
        started(&mut ulp, Duration::from_millis(10));
        ulp.advance(Duration::from_millis(40));
        assert_eq!(lower16(&ulp.rtc_memory().variables().edge_count), 1);

        let mut ulp = driver(vec![true; 8]);
        started(&mut ulp, Duration::from_millis(10));
        store16(&ulp.rtc_memory().variables().io_number, 9);
        ulp.advance(Duration::from_millis(40));
        assert_eq!(lower16(&ulp.rtc_memory().variables().edge_count), 0);
    }

    #[test]
    fn deep_sleep_keeps_program_running() {
        let mut ulp = driver(vec![]);
        started(&mut ulp, Duration::from_millis(20));
        ulp.deep_sleep();
        assert_eq!(ulp.wakeup_cause(), WakeupCause::Timer);
        ulp.advance(Duration::from_secs(300));
        assert!(ulp.is_running());
        assert_eq!(lower16(&ulp.rtc_memory().variables().run_count), 15_000);
    }

    #[test]
    fn power_on_reset_clears_everything() {
        let mut ulp = driver(vec![]);
        started(&mut ulp, Duration::from_millis(20));
        ulp.deep_sleep();
        ulp.advance(Duration::from_secs(1));

        ulp.power_on_reset();
        assert!(!ulp.is_running());
        assert!(ulp.loaded_program().is_none());
        assert_eq!(ulp.wakeup_cause(), WakeupCause::Undefined);
        assert_eq!(ulp.rtc_memory().variables().dump(), [0; 9]);
        assert_eq!(ulp.advance(Duration::from_secs(1)), 0);
    }

    #[test]
    fn injected_failures_fire_once() {
        let mut ulp = driver(vec![]);
        ulp.fail_next_load(UlpError::Driver("flash".into()));
        assert!(ulp.load_program(&PULSE_COUNTER_PROGRAM).is_err());
        assert!(ulp.load_program(&PULSE_COUNTER_PROGRAM).is_ok());
    }

    #[test]
    fn threaded_program_runs_in_wall_time() {
        let mut ulp = driver(vec![]).threaded();
        started(&mut ulp, Duration::from_millis(1));
        thread::sleep(Duration::from_millis(50));
        assert!(lower16(&ulp.rtc_memory().variables().run_count) > 0);

        ulp.power_on_reset();
        assert_eq!(ulp.iterations(), 0);
        assert_eq!(ulp.rtc_memory().variables().dump(), [0; 9]);
    }
}
