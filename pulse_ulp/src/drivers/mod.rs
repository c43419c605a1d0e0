//! ULP driver implementations.
//!
//! - [`simulation`] - Software coprocessor for development and testing
//!
//! Backends implement the `UlpDriver` trait from `pulse_common::ulp::driver`.

pub mod simulation;
