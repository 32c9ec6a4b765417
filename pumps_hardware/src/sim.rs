//! In-memory actuators for simulation and tests.
//!
//! Pins expose a [`PinProbe`] that shares state with the pin, so a test can
//! hand the pin to the engine and still watch every write it makes.

use std::cell::Cell;
use std::rc::Rc;

use pumps_traits::{BoxError, InputPin, OutputPin, Stepper};
use tracing::trace;

use crate::error::HwError;

#[derive(Debug, Default)]
struct PinState {
    level: Cell<bool>,
    writes: Cell<u32>,
    rises: Cell<u32>,
    fail: Cell<bool>,
}

/// Output pin that records its level and how often it was written.
#[derive(Debug, Clone)]
pub struct SimulatedPin {
    name: &'static str,
    state: Rc<PinState>,
}

/// Read side of a [`SimulatedPin`].
#[derive(Debug, Clone)]
pub struct PinProbe {
    state: Rc<PinState>,
}

impl SimulatedPin {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Rc::new(PinState::default()),
        }
    }

    pub fn probe(&self) -> PinProbe {
        PinProbe {
            state: Rc::clone(&self.state),
        }
    }
}

impl PinProbe {
    pub fn is_high(&self) -> bool {
        self.state.level.get()
    }

    /// Total number of writes, including writes of an unchanged level.
    pub fn writes(&self) -> u32 {
        self.state.writes.get()
    }

    /// Number of low-to-high transitions.
    pub fn rises(&self) -> u32 {
        self.state.rises.get()
    }

    /// Make subsequent writes fail until cleared.
    pub fn fail_writes(&self, fail: bool) {
        self.state.fail.set(fail);
    }
}

impl SimulatedPin {
    fn write(&mut self, high: bool) -> Result<(), BoxError> {
        if self.state.fail.get() {
            return Err(Box::new(HwError::InjectedFault(self.name)));
        }
        if high && !self.state.level.get() {
            self.state.rises.set(self.state.rises.get() + 1);
        }
        self.state.level.set(high);
        self.state.writes.set(self.state.writes.get() + 1);
        trace!(pin = self.name, high, "sim pin write");
        Ok(())
    }
}

impl OutputPin for SimulatedPin {
    fn set_high(&mut self) -> Result<(), BoxError> {
        self.write(true)
    }

    fn set_low(&mut self) -> Result<(), BoxError> {
        self.write(false)
    }
}

/// Input pin with a fixed level, e.g. a jumper.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedInput(pub bool);

impl InputPin for SimulatedInput {
    fn is_high(&self) -> Result<bool, BoxError> {
        Ok(self.0)
    }
}

/// Stepper that takes exactly one step per `run()`/`run_speed()` call.
///
/// Speeds and acceleration are recorded but do not pace the simulation.
#[derive(Debug, Default, Clone)]
pub struct SimulatedStepper {
    position: i64,
    target: i64,
    speed: f32,
    max_speed: f32,
    acceleration: f32,
    steps_taken: u64,
}

impl SimulatedStepper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    /// Steps taken in either direction since creation.
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }
}

impl Stepper for SimulatedStepper {
    fn move_relative(&mut self, delta: i64) {
        self.target = self.position.saturating_add(delta);
    }

    fn distance_to_go(&self) -> i64 {
        self.target - self.position
    }

    fn current_position(&self) -> i64 {
        self.position
    }

    fn set_current_position(&mut self, position: i64) {
        self.position = position;
        self.target = position;
        self.speed = 0.0;
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) {
        self.max_speed = steps_per_sec;
    }

    fn set_acceleration(&mut self, steps_per_sec2: f32) {
        self.acceleration = steps_per_sec2;
    }

    fn set_speed(&mut self, steps_per_sec: f32) {
        self.speed = steps_per_sec;
    }

    fn run(&mut self) -> bool {
        let dist = self.distance_to_go();
        if dist == 0 {
            return false;
        }
        self.position += dist.signum();
        self.steps_taken += 1;
        self.distance_to_go() != 0
    }

    fn run_speed(&mut self) -> bool {
        if self.speed == 0.0 {
            return false;
        }
        let dir = if self.speed > 0.0 { 1 } else { -1 };
        self.position += dir;
        self.target += dir;
        self.steps_taken += 1;
        true
    }

    fn stop(&mut self) {
        self.speed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn pin_probe_counts_writes_and_rises() {
        let mut pin = SimulatedPin::new("stir");
        let probe = pin.probe();
        pin.set_high().unwrap();
        pin.set_high().unwrap();
        pin.set_low().unwrap();
        pin.set_high().unwrap();
        assert!(probe.is_high());
        assert_eq!(probe.writes(), 4);
        assert_eq!(probe.rises(), 2);
    }

    #[test]
    fn injected_fault_leaves_level_untouched() {
        let mut pin = SimulatedPin::new("duty1");
        let probe = pin.probe();
        probe.fail_writes(true);
        assert!(pin.set_high().is_err());
        assert!(!probe.is_high());
        assert_eq!(probe.writes(), 0);
    }

    #[rstest]
    #[case(3)]
    #[case(-2)]
    #[case(1)]
    fn run_walks_one_step_toward_target(#[case] distance: i64) {
        let mut s = SimulatedStepper::new();
        s.move_relative(distance);
        for left in (0..distance.abs()).rev() {
            assert_eq!(s.run(), left != 0);
        }
        assert_eq!(s.current_position(), distance);
        assert_eq!(s.distance_to_go(), 0);
        assert!(!s.run());
        assert_eq!(s.steps_taken(), distance.unsigned_abs());
    }

    #[rstest]
    #[case(2500.0, 1)]
    #[case(-800.0, -1)]
    fn run_speed_steps_with_the_sign_of_the_speed(#[case] speed: f32, #[case] step: i64) {
        let mut s = SimulatedStepper::new();
        s.set_speed(speed);
        for n in 1..=3 {
            assert!(s.run_speed());
            assert_eq!(s.current_position(), n * step);
        }
        assert_eq!(s.distance_to_go(), 0);
    }

    #[test]
    fn run_speed_keeps_distance_to_go() {
        let mut s = SimulatedStepper::new();
        s.move_relative(10);
        s.set_speed(2500.0);
        assert!(s.run_speed());
        assert_eq!(s.current_position(), 1);
        assert_eq!(s.distance_to_go(), 10);
        s.stop();
        assert!(!s.run_speed());
    }

    #[test]
    fn set_current_position_collapses_target() {
        let mut s = SimulatedStepper::new();
        s.move_relative(50);
        s.run();
        s.set_current_position(0);
        assert_eq!(s.current_position(), 0);
        assert_eq!(s.distance_to_go(), 0);
    }
}
