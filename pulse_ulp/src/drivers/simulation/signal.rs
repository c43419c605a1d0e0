//! Simulated input line signals.
//!
//! A `SignalSource` answers "what level does the line have now?" each time
//! the simulated coprocessor samples it. Sources see both the time since
//! power-on and the index of the sampling iteration, so a signal can be
//! described in wall time (`PulseTrain`) or sample by sample
//! (`ScriptedLevels`).

use std::time::Duration;

/// Resolution of simulated contact bounce.
const BOUNCE_STEP: Duration = Duration::from_millis(1);

/// Level source of the simulated input line.
pub trait SignalSource: Send {
    /// Line level at `at` (time since power-on), sampled by wakeup number
    /// `iteration` (0-based, counted since the program was started).
    fn level_at(&mut self, at: Duration, iteration: u64) -> bool;
}

/// Periodic meter pulses with optional contact bounce.
///
/// Each period starts low and ends with `pulse_width` of high level, so a
/// rising edge happens at `k × period + (period - pulse_width)` and a falling
/// edge at the end of every period.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseTrain {
    period: Duration,
    pulse_width: Duration,
    bounce: Duration,
}

impl PulseTrain {
    /// Pulses at `frequency_hz`. A frequency of zero keeps the line low.
    pub fn new(frequency_hz: f64, pulse_width: Duration) -> Self {
        let period = if frequency_hz > 0.0 && frequency_hz.is_finite() {
            Duration::from_secs_f64(1.0 / frequency_hz)
        } else {
            Duration::ZERO
        };
        Self {
            period,
            pulse_width: pulse_width.min(period),
            bounce: Duration::ZERO,
        }
    }

    /// Chatter for `bounce` after every ideal edge, toggling each millisecond.
    pub fn with_bounce(mut self, bounce: Duration) -> Self {
        self.bounce = bounce;
        self
    }

    /// Pulse period, zero when the line is idle.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of rising edges in `(0, until]`.
    pub fn rising_edges_until(&self, until: Duration) -> u64 {
        if self.period.is_zero() || self.pulse_width.is_zero() {
            return 0;
        }
        let first = self.period - self.pulse_width;
        if until < first {
            return 0;
        }
        ((until - first).as_nanos() / self.period.as_nanos()) as u64 + 1
    }

    fn ideal_level(&self, pos: Duration) -> bool {
        pos >= self.period - self.pulse_width
    }
}

impl SignalSource for PulseTrain {
    fn level_at(&mut self, at: Duration, _iteration: u64) -> bool {
        if self.period.is_zero() {
            return false;
        }
        let pos = Duration::from_nanos((at.as_nanos() % self.period.as_nanos()) as u64);
        let level = self.ideal_level(pos);
        if self.bounce.is_zero() {
            return level;
        }

        let rise = self.period - self.pulse_width;
        let since_edge = if level { pos - rise } else { pos };
        if since_edge < self.bounce {
            let step = since_edge.as_nanos() / BOUNCE_STEP.as_nanos();
            level ^ (step % 2 == 1)
        } else {
            level
        }
    }
}

/// Levels given per sampling iteration; the last one holds afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedLevels {
    levels: Vec<bool>,
}

impl ScriptedLevels {
    /// Script from explicit levels. An empty script keeps the line low.
    pub fn new(levels: Vec<bool>) -> Self {
        Self { levels }
    }

    /// Script of `pulses` square pulses, each level held for `hold` samples,
    /// starting low.
    pub fn square(pulses: usize, hold: usize) -> Self {
        let mut levels = Vec::with_capacity(pulses * hold * 2 + hold);
        levels.extend(std::iter::repeat_n(false, hold));
        for _ in 0..pulses {
            levels.extend(std::iter::repeat_n(true, hold));
            levels.extend(std::iter::repeat_n(false, hold));
        }
        Self { levels }
    }

    /// Number of scripted samples.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the script is empty.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl SignalSource for ScriptedLevels {
    fn level_at(&mut self, _at: Duration, iteration: u64) -> bool {
        let idx = usize::try_from(iteration).unwrap_or(usize::MAX);
        match self.levels.get(idx) {
            Some(level) => *level,
            None => self.levels.last().copied().unwrap_or(false),
        }
    }
}
