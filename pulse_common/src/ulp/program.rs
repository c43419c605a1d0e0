//! The ULP counting program.
//!
//! The program runs once per ULP wakeup, independent of the main CPU:
//!
//! ```text
//! run_count += 1
//! if level == next_edge            -> debounce_counter = debounce_max_count
//! else if debounce_counter != 0    -> debounce_counter -= 1
//! else                             -> accept: next_edge = level,
//!                                     debounce_counter = debounce_max_count,
//!                                     edge_count ±= 1 per edge mode
//! ```
//!
//! A new level must be seen on `debounce_max_count + 1` consecutive wakeups
//! before it is accepted, so the shortest pulse that gets through is
//! `period × (debounce_max_count + 1)`.
//!
//! `ProgramImage` describes the loadable binary. Its `layout_hash` pins the
//! image to the `UlpVariables` layout it was built against.

use std::sync::atomic::Ordering;

use super::driver::UlpError;
use super::layout::{layout_hash, lower16, store16, UlpVariables, ULP_VARIABLES_SIZE};
use crate::consts::ULP_RESERVED_MEM;
use crate::counter::mode::CountMode;

/// Magic bytes at the start of every ULP binary: `"ulp\0"`.
pub const ULP_BINARY_MAGIC: [u8; 4] = *b"ulp\0";

/// Direction of an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Low to high.
    Rising,
    /// High to low.
    Falling,
}

/// Descriptor of a loadable ULP program image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramImage {
    /// Must be `ULP_BINARY_MAGIC`.
    pub magic: [u8; 4],
    /// Program name for logs.
    pub name: &'static str,
    /// `layout_hash()` of the variable block the image was built against.
    pub layout_hash: u32,
    /// Entry point, in words from the start of RTC slow memory.
    pub entry: u32,
    /// Size of the program text in 32-bit words.
    pub text_words: u32,
}

/// The pulse counting routine, placed right after the variable block.
pub const PULSE_COUNTER_PROGRAM: ProgramImage = ProgramImage {
    magic: ULP_BINARY_MAGIC,
    name: "pulse_cnt",
    layout_hash: layout_hash(),
    entry: (ULP_VARIABLES_SIZE / 4) as u32,
    text_words: 64,
};

impl ProgramImage {
    /// Check that the image can be installed next to the current layout.
    ///
    /// # Errors
    /// - `UlpError::InvalidMagic` if the header is not a ULP binary
    /// - `UlpError::LayoutMismatch` if the image expects another variable layout
    /// - `UlpError::ImageTooLarge` if text and variables exceed reserved memory
    pub fn validate(&self) -> Result<(), UlpError> {
        if self.magic != ULP_BINARY_MAGIC {
            return Err(UlpError::InvalidMagic);
        }
        if self.layout_hash != layout_hash() {
            return Err(UlpError::LayoutMismatch {
                expected: layout_hash(),
                found: self.layout_hash,
            });
        }
        let bytes = self.text_words as usize * 4 + ULP_VARIABLES_SIZE;
        if bytes > ULP_RESERVED_MEM {
            return Err(UlpError::ImageTooLarge {
                bytes,
                reserved: ULP_RESERVED_MEM,
            });
        }
        Ok(())
    }
}

/// Execute one wakeup of the counting program on a sampled line level.
///
/// Returns the edge accepted in this iteration, if any.
pub fn counting_step(vars: &UlpVariables, level: bool) -> Option<Edge> {
    vars.run_count.fetch_add(1, Ordering::AcqRel);

    let level = level as u16;
    if level == lower16(&vars.next_edge) & 1 {
        store16(&vars.debounce_counter, lower16(&vars.debounce_max_count));
        return None;
    }

    let remaining = lower16(&vars.debounce_counter);
    if remaining != 0 {
        store16(&vars.debounce_counter, remaining - 1);
        return None;
    }

    store16(&vars.next_edge, level);
    store16(&vars.debounce_counter, lower16(&vars.debounce_max_count));

    let (edge, mode_word) = if level == 1 {
        (Edge::Rising, &vars.rising_edge_mode)
    } else {
        (Edge::Falling, &vars.falling_edge_mode)
    };
    match CountMode::from_word(lower16(mode_word) as u32) {
        CountMode::Increment => {
            vars.edge_count.fetch_add(1, Ordering::AcqRel);
        }
        CountMode::Decrement => {
            vars.edge_count.fetch_sub(1, Ordering::AcqRel);
        }
        CountMode::Disable => {}
    }
    Some(edge)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(debounce: u16, rising: CountMode, falling: CountMode) -> UlpVariables {
        let vars = UlpVariables::default();
        store16(&vars.debounce_counter, debounce);
        store16(&vars.debounce_max_count, debounce);
        vars.rising_edge_mode.store(rising.as_word(), Ordering::Release);
        vars.falling_edge_mode.store(falling.as_word(), Ordering::Release);
        vars
    }

    #[test]
    fn every_iteration_counts_a_run() {
        let v = vars(3, CountMode::Increment, CountMode::Disable);
        for _ in 0..5 {
            counting_step(&v, false);
        }
        assert_eq!(lower16(&v.run_count), 5);
        assert_eq!(lower16(&v.edge_count), 0);
    }

    #[test]
    fn edge_needs_debounce_plus_one_samples() {
        let v = vars(3, CountMode::Increment, CountMode::Disable);
        for _ in 0..3 {
            assert_eq!(counting_step(&v, true), None);
        }
        assert_eq!(lower16(&v.next_edge), 0);
        assert_eq!(counting_step(&v, true), Some(Edge::Rising));
        assert_eq!(lower16(&v.next_edge), 1);
        assert_eq!(lower16(&v.edge_count), 1);
        assert_eq!(lower16(&v.debounce_counter), 3);
    }

    #[test]
    fn glitch_reloads_debounce_counter() {
        let v = vars(2, CountMode::Increment, CountMode::Disable);
        counting_step(&v, true);
        counting_step(&v, true);
        counting_step(&v, false);
        assert_eq!(lower16(&v.debounce_counter), 2);
        assert_eq!(lower16(&v.edge_count), 0);
    }

    #[test]
    fn zero_debounce_accepts_immediately() {
        let v = vars(0, CountMode::Increment, CountMode::Increment);
        assert_eq!(counting_step(&v, true), Some(Edge::Rising));
        assert_eq!(counting_step(&v, false), Some(Edge::Falling));
        assert_eq!(lower16(&v.edge_count), 2);
    }

    #[test]
    fn falling_edge_uses_its_own_mode() {
        let v = vars(0, CountMode::Disable, CountMode::Decrement);
        counting_step(&v, true);
        assert_eq!(lower16(&v.edge_count), 0);
        counting_step(&v, false);
        assert_eq!(lower16(&v.edge_count), 0xFFFF);
    }

    #[test]
    fn shipped_image_validates() {
        assert!(PULSE_COUNTER_PROGRAM.validate().is_ok());
    }

    #[test]
    fn foreign_image_is_rejected() {
        let bad_magic = ProgramImage {
            magic: *b"elf\0",
            ..PULSE_COUNTER_PROGRAM
        };
        assert!(matches!(bad_magic.validate(), Err(UlpError::InvalidMagic)));

        let stale = ProgramImage {
            layout_hash: PULSE_COUNTER_PROGRAM.layout_hash ^ 1,
            ..PULSE_COUNTER_PROGRAM
        };
        assert!(matches!(stale.validate(), Err(UlpError::LayoutMismatch { .. })));

        let huge = ProgramImage {
            text_words: 1024,
            ..PULSE_COUNTER_PROGRAM
        };
        assert!(matches!(huge.validate(), Err(UlpError::ImageTooLarge { .. })));
    }
}
