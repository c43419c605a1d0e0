//! Boot-relative timestamps and clocks.
//!
//! The main processor's monotonic clock restarts from zero on every boot,
//! including a wake from deep sleep. Reconstructing the time of the last
//! snapshot after a wake can therefore land *before* the current boot, so
//! [`Timestamp`] is signed.

use std::ops::Sub;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Signed microsecond timestamp relative to the current boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    micros: i64,
}

impl Timestamp {
    /// Boot instant.
    pub const ZERO: Self = Self { micros: 0 };

    /// Create a timestamp from signed microseconds since boot.
    pub const fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Signed microseconds since boot.
    pub const fn as_micros(&self) -> i64 {
        self.micros
    }

    /// Elapsed time from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_duration_since(&self, earlier: Timestamp) -> Duration {
        let delta = self.micros.saturating_sub(earlier.micros);
        Duration::from_micros(delta.max(0) as u64)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        let rhs = i64::try_from(rhs.as_micros()).unwrap_or(i64::MAX);
        Timestamp::from_micros(self.micros.saturating_sub(rhs))
    }
}

/// Monotonic clock of the main processor.
pub trait Clock {
    /// Current time since boot.
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Clock driven by the caller, shared through cheap clones.
///
/// Used by the stepped simulation and tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_micros()).unwrap_or(i64::MAX);
        self.micros.fetch_add(by, Ordering::AcqRel);
    }

    /// Jump to an absolute time.
    pub fn set(&self, at: Timestamp) {
        self.micros.store(at.as_micros(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.micros.load(Ordering::Acquire))
    }
}

/// Wall-clock backed monotonic clock starting at zero when created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    boot: Instant,
}

impl MonotonicClock {
    /// Start a clock at the current instant.
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let micros = i64::try_from(self.boot.elapsed().as_micros()).unwrap_or(i64::MAX);
        Timestamp::from_micros(micros)
    }
}
