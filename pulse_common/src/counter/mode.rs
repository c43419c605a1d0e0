//! Edge counting policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an accepted rising or falling edge changes `edge_count`.
///
/// The discriminant is the word written to RTC memory for the ULP program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum CountMode {
    /// Edge is ignored.
    #[serde(alias = "DISABLE", alias = "disabled")]
    #[default]
    Disable = 0,
    /// Edge adds one.
    #[serde(alias = "INCREMENT")]
    Increment = 1,
    /// Edge subtracts one.
    #[serde(alias = "DECREMENT")]
    Decrement = 2,
}

impl CountMode {
    /// Decode the RTC memory word. Unknown words count as `Disable`.
    #[inline]
    pub const fn from_word(word: u32) -> Self {
        match word {
            1 => Self::Increment,
            2 => Self::Decrement,
            _ => Self::Disable,
        }
    }

    /// Word stored in RTC memory.
    #[inline]
    pub const fn as_word(self) -> u32 {
        self as u32
    }

    /// Lowercase name used in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Increment => "increment",
            Self::Decrement => "decrement",
        }
    }
}

impl fmt::Display for CountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
