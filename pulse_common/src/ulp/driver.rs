//! ULP driver trait and error types.
//!
//! This module defines:
//! - `UlpDriver` trait - Interface to the coprocessor and RTC domain
//! - `UlpError` enum - Error types for driver operations
//! - `WakeupCause` enum - Why the main CPU is running

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::layout::RtcSlowMemory;
use super::program::ProgramImage;
use super::rtc_io;

/// Error types for ULP driver operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UlpError {
    /// Image header is not a ULP binary.
    #[error("invalid ULP binary magic")]
    InvalidMagic,

    /// Image was built against another variable layout.
    #[error("variable layout mismatch (expected hash {expected:#010x}, image has {found:#010x})")]
    LayoutMismatch {
        /// Hash of the layout compiled into this firmware.
        expected: u32,
        /// Hash recorded in the image.
        found: u32,
    },

    /// Image does not fit in reserved RTC slow memory.
    #[error("program needs {bytes} bytes, only {reserved} reserved")]
    ImageTooLarge {
        /// Bytes needed by text and variables.
        bytes: usize,
        /// Bytes reserved for the ULP.
        reserved: usize,
    },

    /// `run()` called before a program was loaded.
    #[error("no ULP program loaded")]
    NotLoaded,

    /// Entry point outside the loaded program.
    #[error("entry point {0} outside the loaded program")]
    InvalidEntry(u32),

    /// Wakeup period not supported by the timer.
    #[error("invalid ULP wakeup period: {0:?}")]
    InvalidPeriod(Duration),

    /// GPIO cannot be routed to the RTC domain.
    #[error("GPIO{0} is not an RTC IO")]
    NotRtcIo(u8),

    /// Backend-specific failure.
    #[error("ULP driver error: {0}")]
    Driver(String),
}

/// Reason the main CPU is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeupCause {
    /// Not a wake from deep sleep: power-on, reset or first boot.
    #[default]
    Undefined,
    /// RTC timer expired.
    Timer,
    /// External RTC IO signal.
    External,
    /// ULP program requested the wakeup.
    Ulp,
}

impl WakeupCause {
    /// Whether RTC memory has to be (re)initialized.
    #[inline]
    pub const fn is_cold_boot(self) -> bool {
        matches!(self, Self::Undefined)
    }
}

/// Trait defining the interface to the ULP coprocessor and RTC domain.
///
/// The controller drives a backend through this trait, so the same start and
/// resume paths run against real hardware bindings or the simulation driver.
///
/// # Lifecycle
///
/// 1. `load_program()` - install the image (cold boot only)
/// 2. `configure_rtc_input()` / `set_wakeup_period()`
/// 3. `run()` - start autonomous execution; survives main CPU deep sleep
pub trait UlpDriver: Send {
    /// Backend identifier (e.g. "simulation").
    fn name(&self) -> &'static str;

    /// Why the main CPU is running now.
    fn wakeup_cause(&self) -> WakeupCause;

    /// RTC slow memory shared with the coprocessor.
    fn rtc_memory(&self) -> Arc<RtcSlowMemory>;

    /// Install a program image.
    ///
    /// # Errors
    /// Any `UlpError` describing why the image cannot be installed.
    fn load_program(&mut self, image: &ProgramImage) -> Result<(), UlpError>;

    /// RTC IO number of a GPIO, `None` for pins outside the RTC domain.
    fn rtc_io_number(&self, gpio: u8) -> Option<u8> {
        rtc_io::rtc_io_number(gpio)
    }

    /// Route a GPIO to the RTC domain as input-only and hold its
    /// configuration across deep sleep.
    fn configure_rtc_input(&mut self, gpio: u8) -> Result<(), UlpError>;

    /// Set the period between coprocessor wakeups.
    fn set_wakeup_period(&mut self, period: Duration) -> Result<(), UlpError>;

    /// Start the loaded program at `entry` (words from start of RTC memory).
    fn run(&mut self, entry: u32) -> Result<(), UlpError>;
}
