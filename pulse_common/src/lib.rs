//! Pulse Counter Common Library
//!
//! This crate provides the pieces shared by the ULP coprocessor side and the
//! main-processor side of the pulse counter: the fixed RTC slow memory layout,
//! the counting program, the driver contract and configuration loading.
//!
//! # Module Structure
//!
//! - [`ulp`] - RTC memory layout, counting program, driver trait, RTC IO map
//! - [`counter`] - Counter configuration, count modes, snapshots and errors
//! - [`config`] - Configuration loading traits and types
//! - [`time`] - Boot-relative timestamps and clocks
//! - [`consts`] - Defaults and limits
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use pulse_common::prelude::*;
//! use pulse_common::ulp::layout::RtcSlowMemory;
//! ```

pub mod config;
pub mod consts;
pub mod counter;
pub mod prelude;
pub mod time;
pub mod ulp;
