//! Pulse counter types shared by the controller and the rate sensor.
//!
//! - `mode`: `CountMode` edge policy.
//! - `config`: Counter, sensor and application configuration.
//! - `state`: `State` snapshot read from RTC memory.
//! - `error`: Startup errors and configuration warnings.

pub mod config;
pub mod error;
pub mod mode;
pub mod state;
