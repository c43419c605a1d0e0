//! Snapshot of the ULP counters.

use std::time::Duration;

use super::mode::CountMode;

/// Counters read from RTC memory at one point in time.
///
/// Produced by `peek_state()` / `pop_state()`; carries no lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct State {
    /// Raw 16-bit edge counter.
    pub edge_count: u16,
    /// Raw 16-bit iteration counter.
    pub run_count: u16,
    /// Current estimate of one ULP iteration.
    pub mean_exec_time: Duration,
}

impl State {
    /// Edge count as a signed delta.
    ///
    /// With a `decrement` mode on either direction the counter can go below
    /// zero and is read as two's complement; otherwise it is unsigned.
    pub fn edges(&self, rising: CountMode, falling: CountMode) -> i32 {
        if rising == CountMode::Decrement || falling == CountMode::Decrement {
            self.edge_count as i16 as i32
        } else {
            self.edge_count as i32
        }
    }

    /// Time the ULP spent since the last snapshot, by its own count.
    pub fn elapsed_estimate(&self) -> Duration {
        self.mean_exec_time * self.run_count as u32
    }

    /// `run_count == 0` with a nonzero edge count cannot happen on a healthy
    /// program: every iteration that can accept an edge also counts a run.
    pub fn is_inconsistent(&self) -> bool {
        self.run_count == 0 && self.edge_count != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_signed_only_with_decrement() {
        let state = State {
            edge_count: 0xFFFE,
            ..State::default()
        };
        assert_eq!(state.edges(CountMode::Increment, CountMode::Disable), 65534);
        assert_eq!(state.edges(CountMode::Disable, CountMode::Decrement), -2);
    }

    #[test]
    fn elapsed_estimate_multiplies_runs() {
        let state = State {
            edge_count: 0,
            run_count: 15_000,
            mean_exec_time: Duration::from_millis(20),
        };
        assert_eq!(state.elapsed_estimate(), Duration::from_secs(300));
    }

    #[test]
    fn inconsistency_detection() {
        let mut state = State::default();
        assert!(!state.is_inconsistent());
        state.edge_count = 3;
        assert!(state.is_inconsistent());
        state.run_count = 1;
        assert!(!state.is_inconsistent());
    }
}
