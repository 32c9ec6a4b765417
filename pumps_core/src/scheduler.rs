//! Actuator Scheduler: four steppers behind one shared driver-enable line.
//!
//! The host can only pulse one stepper per control-loop pass, so
//! [`ActuatorScheduler::advance`] drives the lowest-numbered pump that still
//! has distance to go and leaves every other pump untouched for that pass.
//! Higher-numbered pumps wait until the lower ones finish.

use pumps_traits::{OutputPin, Stepper};
use tracing::{debug, trace};

use crate::pin::LatchedPin;
use crate::types::{PumpId, STEPPER_COUNT};

pub struct ActuatorScheduler<S, P> {
    steppers: [S; STEPPER_COUNT],
    enable: LatchedPin<P>,
}

impl<S: Stepper, P: OutputPin> ActuatorScheduler<S, P> {
    pub fn new(steppers: [S; STEPPER_COUNT], enable: P) -> Self {
        Self {
            steppers,
            enable: LatchedPin::new(enable, "stepper_enable"),
        }
    }

    /// Apply the dosing profile to every stepper.
    pub fn configure(&mut self, max_speed: f32, acceleration: f32) {
        for s in &mut self.steppers {
            s.set_max_speed(max_speed);
            s.set_acceleration(acceleration);
        }
    }

    /// Extend `pump`'s travel by `delta` steps and enable the drivers.
    ///
    /// Additive: a move requested before the previous one finished is added
    /// to what is still outstanding.
    pub fn request_move(&mut self, pump: PumpId, delta: i64) {
        let s = &mut self.steppers[pump.index()];
        let pending = s.distance_to_go().saturating_add(delta);
        s.move_relative(pending);
        self.enable_outputs();
        debug!(pump = pump.get(), delta, pending, "move queued");
    }

    /// Drive the first pump (in id order) with outstanding distance by one
    /// scheduling unit. Returns that pump, or `None` after disabling the
    /// drivers when nothing is pending.
    pub fn advance(&mut self) -> Option<PumpId> {
        let idx = self.steppers.iter().position(|s| s.distance_to_go() != 0);
        match idx {
            Some(i) => {
                self.enable_outputs();
                let still_running = self.steppers[i].run();
                let pump = PumpId::from_index(i);
                if !still_running {
                    debug!(pump = pump.get(), position = self.steppers[i].current_position(), "move complete");
                }
                Some(pump)
            }
            None => {
                if self.enable.set(false) {
                    trace!("stepper drivers disabled");
                }
                None
            }
        }
    }

    /// Constant-speed step for a calibrating pump. Returns true when a step
    /// was taken.
    pub fn run_constant(&mut self, pump: PumpId) -> bool {
        self.enable_outputs();
        self.steppers[pump.index()].run_speed()
    }

    pub fn set_constant_speed(&mut self, pump: PumpId, steps_per_sec: f32) {
        self.steppers[pump.index()].set_speed(steps_per_sec);
    }

    /// Stop a constant-speed run and zero the pump's position.
    pub fn halt_and_zero(&mut self, pump: PumpId) {
        let s = &mut self.steppers[pump.index()];
        s.stop();
        s.set_current_position(0);
    }

    /// Drop every pump's outstanding distance where it stands.
    pub fn abandon_all(&mut self) {
        for s in &mut self.steppers {
            let here = s.current_position();
            s.stop();
            s.set_current_position(here);
        }
    }

    /// Zero every position, keeping outstanding distance intact.
    pub fn reset_positions(&mut self) {
        for s in &mut self.steppers {
            let pending = s.distance_to_go();
            s.set_current_position(0);
            if pending != 0 {
                s.move_relative(pending);
            }
        }
    }

    pub fn enable_outputs(&mut self) {
        self.enable.set(true);
    }

    pub fn disable_outputs(&mut self) {
        self.enable.set(false);
    }

    pub fn outputs_enabled(&self) -> bool {
        self.enable.is_high()
    }

    pub fn pending(&self, pump: PumpId) -> i64 {
        self.steppers[pump.index()].distance_to_go()
    }

    pub fn position(&self, pump: PumpId) -> i64 {
        self.steppers[pump.index()].current_position()
    }

    pub fn has_pending(&self) -> bool {
        self.steppers.iter().any(|s| s.distance_to_go() != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumps_hardware::{PinProbe, SimulatedPin, SimulatedStepper};

    fn scheduler() -> (ActuatorScheduler<SimulatedStepper, SimulatedPin>, PinProbe) {
        let pin = SimulatedPin::new("enable");
        let probe = pin.probe();
        let steppers = std::array::from_fn(|_| SimulatedStepper::new());
        (ActuatorScheduler::new(steppers, pin), probe)
    }

    fn pump(n: i64) -> PumpId {
        PumpId::new(n).unwrap()
    }

    #[test]
    fn moves_are_additive() {
        let (mut s, probe) = scheduler();
        s.request_move(pump(2), 300);
        s.advance();
        s.request_move(pump(2), 200);
        assert_eq!(s.pending(pump(2)), 499);
        assert!(probe.is_high());
    }

    #[test]
    fn only_lowest_pending_pump_moves() {
        let (mut s, _) = scheduler();
        s.request_move(pump(4), 10);
        s.request_move(pump(2), 10);
        s.request_move(pump(3), 10);
        assert_eq!(s.advance(), Some(pump(2)));
        assert_eq!(s.pending(pump(2)), 9);
        assert_eq!(s.pending(pump(3)), 10);
        assert_eq!(s.pending(pump(4)), 10);
    }

    #[test]
    fn idle_advance_disables_once() {
        let (mut s, probe) = scheduler();
        for _ in 0..10 {
            assert_eq!(s.advance(), None);
        }
        assert_eq!(probe.writes(), 1);
        assert!(!probe.is_high());
    }

    #[test]
    fn negative_moves_are_pending_too() {
        let (mut s, _) = scheduler();
        s.request_move(pump(1), -3);
        assert!(s.has_pending());
        for _ in 0..3 {
            assert_eq!(s.advance(), Some(pump(1)));
        }
        assert_eq!(s.position(pump(1)), -3);
        assert!(!s.has_pending());
    }

    #[test]
    fn reset_keeps_outstanding_distance() {
        let (mut s, _) = scheduler();
        s.request_move(pump(1), 10);
        for _ in 0..4 {
            s.advance();
        }
        s.reset_positions();
        assert_eq!(s.position(pump(1)), 0);
        assert_eq!(s.pending(pump(1)), 6);
    }
}
