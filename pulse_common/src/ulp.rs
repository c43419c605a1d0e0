//! ULP coprocessor subsystem.
//!
//! This module contains:
//! - `layout`: The `UlpVariables` block in RTC slow memory (fixed offsets).
//! - `program`: The counting program and its loadable image descriptor.
//! - `driver`: The `UlpDriver` trait implemented by platform backends.
//! - `rtc_io`: GPIO to RTC IO number mapping.

pub mod driver;
pub mod layout;
pub mod program;
pub mod rtc_io;
