#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Pump coordination engine (hardware-agnostic).
//!
//! Drives four stepper pumps and two duty-cycled pumps, learns their
//! volume ratios by calibration, and keeps a stirrer running around every
//! dose. All hardware goes through the `pumps_traits` seams.
//!
//! ## Architecture
//!
//! - **Actuator Scheduler**: one stepper moves per pass (`scheduler`)
//! - **Duty Motor Timer**: tick countdown per on/off pump (`duty`)
//! - **Calibration Engine**: count raw units against a measured volume (`calibration`)
//! - **Stirrer Coordinator**: start/stop delays around dosing (`stirrer`)
//! - **Dosing Engine**: entry points and the pass itself (`engine`)
//! - **Protocol**: line commands and replies (`command`), background intake
//!   (`intake`) and the control loop (`runner`)
//!
//! The engine is single-threaded: every mutation happens inside a method on
//! `DoserCore`, and a pass always runs timers, then the stirrer stop check,
//! then actuator advancement.

pub mod builder;
pub mod calibration;
pub mod command;
pub mod config;
mod conversions;
pub mod duty;
pub mod engine;
pub mod error;
pub mod hw_error;
pub mod intake;
pub mod mocks;
pub mod pin;
pub mod ratio;
pub mod runner;
pub mod scheduler;
pub mod status;
pub mod stirrer;
pub mod timers;
pub mod types;

pub use builder::DoserBuilder;
pub use command::{Command, DEFAULT_TARGET_ML, Reply};
pub use config::{CoreCfg, StepperProfile};
pub use engine::{CalibrationEvent, DoserCore};
pub use error::{BuildError, ParseError, PumpsError, Report, Result};
pub use intake::CommandReader;
pub use runner::{RunParams, RunStats};
pub use status::{PassReport, Snapshot, StirrerState};
pub use stirrer::StirrerTiming;
pub use types::{ActuatorClass, DUTY_COUNT, MotorId, PumpId, STEPPER_COUNT};

use pumps_traits::{OutputPin, RatioStore, Stepper};

/// Engine over boxed parts, for callers that pick hardware at runtime.
pub type Doser = DoserCore<Box<dyn Stepper>, Box<dyn OutputPin>, Box<dyn RatioStore>>;

impl Doser {
    pub fn builder() -> DoserBuilder<Box<dyn Stepper>, Box<dyn OutputPin>, Box<dyn RatioStore>> {
        DoserBuilder::default()
    }
}
