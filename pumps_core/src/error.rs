use thiserror::Error;

use crate::types::ActuatorClass;

/// Per-field rejection of a protocol line.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown function code {0}")]
    UnknownFunction(i64),
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("{field}: {token:?} is not an integer")]
    BadInteger { field: &'static str, token: String },
    #[error("{field}: {token:?} is not a finite number")]
    BadFloat { field: &'static str, token: String },
    #[error("switch: {0:?} is not 0 or 1")]
    BadSwitch(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PumpsError {
    #[error("{class} id {id} out of range 1..={max}")]
    InvalidId {
        class: ActuatorClass,
        id: i64,
        max: usize,
    },
    #[error("volume must be a finite number of ml (> 0 for duty motors), got {0}")]
    InvalidVolume(f32),
    #[error("calibration target must be a whole number of ml > 0, got {0}")]
    InvalidTarget(i64),
    #[error("no {0} calibration session is active")]
    NoCalibrationSession(ActuatorClass),
    #[error("command rejected: {0}")]
    Parse(#[from] ParseError),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("persistence error: {0}")]
    Persist(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing steppers")]
    MissingSteppers,
    #[error("missing stepper enable pin")]
    MissingEnablePin,
    #[error("missing duty motor pins")]
    MissingDutyPins,
    #[error("missing stirrer pin")]
    MissingStirrerPin,
    #[error("missing ratio store")]
    MissingRatioStore,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
