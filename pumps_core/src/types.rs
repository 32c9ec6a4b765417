//! Actuator identities.
//!
//! Protocol ids are 1-based; the arrays that hold actuators are 0-based.

use core::fmt;

use crate::error::PumpsError;

pub use pumps_config::{DUTY_COUNT, STEPPER_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorClass {
    Stepper,
    Duty,
}

impl fmt::Display for ActuatorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stepper => "stepper",
            Self::Duty => "duty motor",
        })
    }
}

/// Stepper pump, 1..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PumpId(u8);

/// Duty-cycled motor, 1..=2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotorId(u8);

fn check(id: i64, max: usize, class: ActuatorClass) -> Result<u8, PumpsError> {
    if (1..=max as i64).contains(&id) {
        Ok(id as u8)
    } else {
        Err(PumpsError::InvalidId { class, id, max })
    }
}

impl PumpId {
    pub fn new(id: i64) -> Result<Self, PumpsError> {
        check(id, STEPPER_COUNT, ActuatorClass::Stepper).map(Self)
    }

    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < STEPPER_COUNT);
        Self(index as u8 + 1)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl MotorId {
    pub fn new(id: i64) -> Result<Self, PumpsError> {
        check(id, DUTY_COUNT, ActuatorClass::Duty).map(Self)
    }

    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < DUTY_COUNT);
        Self(index as u8 + 1)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl fmt::Display for PumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_ids_are_one_based() {
        assert_eq!(PumpId::new(1).unwrap().index(), 0);
        assert_eq!(PumpId::new(4).unwrap().index(), 3);
        assert!(PumpId::new(0).is_err());
        assert!(PumpId::new(5).is_err());
        assert!(PumpId::new(-1).is_err());
    }

    #[test]
    fn motor_ids_stop_at_two() {
        assert!(MotorId::new(2).is_ok());
        let err = MotorId::new(3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "duty motor id 3 out of range 1..=2"
        );
    }
}
