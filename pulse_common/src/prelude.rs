//! Prelude module for common re-exports.
//!
//! ```rust
//! use pulse_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::counter::config::{CounterConfig, PulseUlpConfig, SensorConfig};

// ─── Counter ────────────────────────────────────────────────────────
pub use crate::counter::error::{ConfigWarning, StartupError};
pub use crate::counter::mode::CountMode;
pub use crate::counter::state::State;

// ─── Time ───────────────────────────────────────────────────────────
pub use crate::time::{Clock, ManualClock, MonotonicClock, Timestamp};

// ─── ULP ────────────────────────────────────────────────────────────
pub use crate::ulp::driver::{UlpDriver, UlpError, WakeupCause};
pub use crate::ulp::layout::{RtcSlowMemory, UlpVariables};
pub use crate::ulp::program::{counting_step, Edge, ProgramImage, PULSE_COUNTER_PROGRAM};
