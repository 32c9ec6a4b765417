//! Actuator backends for the pump controller.
//!
//! Simulated pins and steppers are always available; GPIO-backed ones need
//! the `hardware` feature on Linux.

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;

pub use error::HwError;
pub use sim::{PinProbe, SimulatedInput, SimulatedPin, SimulatedStepper};
