//! Startup errors and configuration warnings of the ULP counter.

use thiserror::Error;

use crate::ulp::driver::UlpError;

/// Fatal errors of `UlpProgram::start`. No retry is attempted.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Program image could not be installed in RTC slow memory.
    #[error("Loading ULP binary failed: {0}")]
    LoadFailed(#[source] UlpError),

    /// Installed program could not be started.
    #[error("Starting ULP program failed: {0}")]
    RunFailed(#[source] UlpError),
}

/// Non-fatal configuration problems. Logged, counting proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    /// The GPIO cannot be routed to the RTC IO domain; the program will
    /// sample a line that is not connected to it.
    #[error("GPIO{0} used for pulse counting must be an RTC IO")]
    InvalidPin(u8),
}
