//! # Pulse ULP Library
//!
//! Main-CPU side of a pulse counter that keeps counting through deep sleep
//! on the ESP32 ULP coprocessor, plus a software coprocessor to run it on.
//!
//! # Module Structure
//!
//! - [`program`] - `UlpProgram`: cold-boot start, resume, counter snapshots
//! - [`sensor`] - `PulseCounterUlpSensor`: rate and total from snapshots
//! - [`sink`] - Destinations of published values
//! - [`core`] - `DeviceCore`: simulated awake/sleep loop
//! - [`drivers`] - `UlpDriver` implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  main CPU (sleeps)                                               │
//! │  ┌────────────────┐   ┌──────────────┐   ┌──────────────────┐    │
//! │  │ DeviceCore     │──►│ Sensor       │──►│ SensorSink       │    │
//! │  │ boot/tick/sleep│   │ rate, total  │   │ JSON lines       │    │
//! │  └────────────────┘   └──────┬───────┘   └──────────────────┘    │
//! │                              │ start / resume / pop_state        │
//! │                       ┌──────▼───────┐                           │
//! │                       │ UlpProgram   │                           │
//! │                       └──────┬───────┘                           │
//! └──────────────────────────────┼───────────────────────────────────┘
//!                                │ RTC slow memory (UlpVariables)
//! ┌──────────────────────────────▼───────────────────────────────────┐
//! │  ULP coprocessor (always on): counting_step() every period       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod core;
pub mod drivers;
pub mod program;
pub mod sensor;
pub mod sink;

pub use crate::core::DeviceCore;
pub use crate::program::UlpProgram;
pub use crate::sensor::PulseCounterUlpSensor;
