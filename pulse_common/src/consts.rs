//! System-wide constants for the pulse counter workspace.
//!
//! Single source of truth for defaults and word-width limits.

/// Mask of the bits the ULP coprocessor reads and writes in a 32-bit RTC word.
pub const ULP_WORD_MASK: u32 = 0xFFFF;

/// Default ULP wakeup period in microseconds (20 ms).
pub const DEFAULT_SAMPLE_PERIOD_US: u32 = 20_000;

/// Default number of extra consistent samples before an edge is accepted.
///
/// With the default period the minimum pulse width is 20 ms × (3 + 1) = 80 ms.
pub const DEFAULT_DEBOUNCE: u16 = 3;

/// Default sensor update interval in milliseconds (60 s).
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 60_000;

/// Default sensor name used in logs and published readings.
pub const DEFAULT_SENSOR_NAME: &str = "pulse_counter";

/// RTC IO number stored when the configured GPIO has no RTC mapping.
pub const INVALID_RTC_IO: u16 = 0xFFFF;

/// Bytes of RTC slow memory reserved for the ULP program and its variables.
pub const ULP_RESERVED_MEM: usize = 1024;

/// Microseconds per minute, the unit of published rates.
pub const US_PER_MINUTE: u64 = 60_000_000;
