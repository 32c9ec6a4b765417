//! Observable engine state.

use crate::types::{DUTY_COUNT, MotorId, PumpId, STEPPER_COUNT};

pub use crate::stirrer::StirrerState;

/// What one control-loop pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Stepper driven this pass, dosing or calibrating.
    pub stepped: Option<PumpId>,
    /// Duty ticks applied this pass.
    pub duty_ticks: u32,
    pub timers_fired: u32,
    /// Actuators were held back by the stirrer start-delay.
    pub suppressed: bool,
}

impl PassReport {
    pub fn did_work(&self) -> bool {
        self.stepped.is_some() || self.duty_ticks > 0 || self.timers_fired > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperSnapshot {
    pub pending: i64,
    pub position: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutySnapshot {
    pub remaining_ticks: u64,
    pub on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot<Id> {
    pub id: Id,
    pub target_ml: u32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub steppers: [StepperSnapshot; STEPPER_COUNT],
    pub duty: [DutySnapshot; DUTY_COUNT],
    pub drivers_enabled: bool,
    /// Stirrer coordination is active (jumper closed or config).
    pub stirrer_enabled: bool,
    pub stirrer: StirrerState,
    pub stirrer_on: bool,
    pub stepper_calibration: Option<SessionSnapshot<PumpId>>,
    pub motor_calibration: Option<SessionSnapshot<MotorId>>,
}

impl Snapshot {
    pub fn stepper(&self, pump: PumpId) -> StepperSnapshot {
        self.steppers[pump.index()]
    }

    pub fn motor(&self, motor: MotorId) -> DutySnapshot {
        self.duty[motor.index()]
    }
}
