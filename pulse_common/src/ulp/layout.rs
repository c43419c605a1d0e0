//! RTC slow memory variable block shared by the ULP program and the main CPU.
//!
//! Defines `UlpVariables` (36 bytes, nine 32-bit words) and `RtcSlowMemory`,
//! the owner of the block. The block keeps its contents across deep sleep and
//! is zeroed only by a power-on reset.
//!
//! ## Word Ownership
//!
//! The ULP can only load and store the low 16 bits of a word, so every field
//! the program touches is read back through [`lower16`]. Each word has exactly
//! one writer per phase:
//!
//! | Word                 | ULP            | Main CPU                     |
//! |----------------------|----------------|------------------------------|
//! | `edge_count`         | accumulates    | zeroes on snapshot           |
//! | `run_count`          | accumulates    | zeroes on snapshot           |
//! | `debounce_counter`   | owns           | initializes on cold boot     |
//! | `debounce_max_count` | reads          | initializes on cold boot     |
//! | `next_edge`          | owns           | initializes on cold boot     |
//! | `io_number`          | reads          | initializes on cold boot     |
//! | `rising_edge_mode`   | reads          | initializes on cold boot     |
//! | `falling_edge_mode`  | reads          | initializes on cold boot     |
//! | `mean_exec_time`     | -              | owns (µs per iteration)      |
//!
//! No lock protects the block; none exists across the two processors.

use core::mem::{align_of, offset_of, size_of};
use static_assertions::const_assert_eq;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::consts::ULP_WORD_MASK;

/// Variable block placed at a fixed address in RTC slow memory.
///
/// Field order and widths are part of the contract with the separately
/// built ULP program image. Never reorder.
#[derive(Debug, Default)]
#[repr(C)]
pub struct UlpVariables {
    /// Signed effect of accepted edges since the last snapshot (16-bit).
    pub edge_count: AtomicU32,
    /// ULP wake iterations since the last snapshot (16-bit).
    pub run_count: AtomicU32,
    /// Remaining differing samples before an edge is accepted.
    pub debounce_counter: AtomicU32,
    /// Reload value of `debounce_counter`.
    pub debounce_max_count: AtomicU32,
    /// Last accepted line level (0 or 1).
    pub next_edge: AtomicU32,
    /// RTC IO number the program samples.
    pub io_number: AtomicU32,
    /// `CountMode` word applied to rising edges.
    pub rising_edge_mode: AtomicU32,
    /// `CountMode` word applied to falling edges.
    pub falling_edge_mode: AtomicU32,
    /// Main-CPU estimate of one ULP iteration in microseconds.
    pub mean_exec_time: AtomicU32,
}

/// Size of the variable block in bytes.
pub const ULP_VARIABLES_SIZE: usize = size_of::<UlpVariables>();

const_assert_eq!(size_of::<UlpVariables>(), 36);
const_assert_eq!(align_of::<UlpVariables>(), 4);
const_assert_eq!(offset_of!(UlpVariables, edge_count), 0);
const_assert_eq!(offset_of!(UlpVariables, run_count), 4);
const_assert_eq!(offset_of!(UlpVariables, debounce_counter), 8);
const_assert_eq!(offset_of!(UlpVariables, debounce_max_count), 12);
const_assert_eq!(offset_of!(UlpVariables, next_edge), 16);
const_assert_eq!(offset_of!(UlpVariables, io_number), 20);
const_assert_eq!(offset_of!(UlpVariables, rising_edge_mode), 24);
const_assert_eq!(offset_of!(UlpVariables, falling_edge_mode), 28);
const_assert_eq!(offset_of!(UlpVariables, mean_exec_time), 32);

/// Read the 16 bits of a word the ULP actually uses.
#[inline]
pub fn lower16(word: &AtomicU32) -> u16 {
    (word.load(Ordering::Acquire) & ULP_WORD_MASK) as u16
}

/// Store a 16-bit value the way the ULP `ST` instruction leaves it.
#[inline]
pub fn store16(word: &AtomicU32, value: u16) {
    word.store(value as u32, Ordering::Release);
}

impl UlpVariables {
    /// Zero every word, as after a power-on reset.
    pub fn clear(&self) {
        for word in self.words() {
            word.store(0, Ordering::Release);
        }
    }

    /// Current raw value of every word, in layout order.
    pub fn dump(&self) -> [u32; 9] {
        let mut out = [0u32; 9];
        for (slot, word) in out.iter_mut().zip(self.words()) {
            *slot = word.load(Ordering::Acquire);
        }
        out
    }

    fn words(&self) -> [&AtomicU32; 9] {
        [
            &self.edge_count,
            &self.run_count,
            &self.debounce_counter,
            &self.debounce_max_count,
            &self.next_edge,
            &self.io_number,
            &self.rising_edge_mode,
            &self.falling_edge_mode,
            &self.mean_exec_time,
        ]
    }
}

/// RTC slow memory region holding the ULP variables.
///
/// Shared through `Arc` between the coprocessor (simulated or real backend)
/// and the main-CPU controller. Deep sleep keeps the `Arc` alive; only
/// [`RtcSlowMemory::power_on_reset`] clears it.
#[derive(Debug, Default)]
pub struct RtcSlowMemory {
    variables: UlpVariables,
}

impl RtcSlowMemory {
    /// Create a zeroed region.
    pub fn new() -> Self {
        Self::default()
    }

    /// The variable block.
    #[inline]
    pub fn variables(&self) -> &UlpVariables {
        &self.variables
    }

    /// Zero the region, as on a true cold boot.
    pub fn power_on_reset(&self) {
        self.variables.clear();
    }
}

/// Compile-time layout hash of `UlpVariables`.
///
/// Mixes the block size, alignment and every field offset so that a program
/// image built against a different field order is rejected at load time.
pub const fn layout_hash() -> u32 {
    let offsets = [
        offset_of!(UlpVariables, edge_count),
        offset_of!(UlpVariables, run_count),
        offset_of!(UlpVariables, debounce_counter),
        offset_of!(UlpVariables, debounce_max_count),
        offset_of!(UlpVariables, next_edge),
        offset_of!(UlpVariables, io_number),
        offset_of!(UlpVariables, rising_edge_mode),
        offset_of!(UlpVariables, falling_edge_mode),
        offset_of!(UlpVariables, mean_exec_time),
    ];
    let mut hash = (size_of::<UlpVariables>() as u32).wrapping_mul(0x9E3779B9)
        ^ (align_of::<UlpVariables>() as u32).wrapping_mul(0x517CC1B7);
    let mut i = 0;
    while i < offsets.len() {
        hash = hash.rotate_left(5) ^ (offsets[i] as u32).wrapping_mul(0x27D4EB2F);
        i += 1;
    }
    hash
}
