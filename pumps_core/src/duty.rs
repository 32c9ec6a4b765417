//! Duty Motor Timer: two on/off pumps timed in ticks.
//!
//! Each motor holds a remaining-tick counter that one `tick()` decrements
//! while it is non-zero. The motor pin is written only on transitions.
//! A motor claimed by a calibration session stays on and its counter is
//! frozen: doses queued before or during the claim run once it is released.

use pumps_traits::OutputPin;
use tracing::debug;

use crate::pin::LatchedPin;
use crate::types::{DUTY_COUNT, MotorId};

struct DutyMotor<P> {
    remaining: u64,
    pin: LatchedPin<P>,
}

pub struct DutyMotorTimer<P> {
    motors: [DutyMotor<P>; DUTY_COUNT],
    claimed: Option<MotorId>,
}

impl<P: OutputPin> DutyMotorTimer<P> {
    pub fn new(pins: [P; DUTY_COUNT]) -> Self {
        const LABELS: [&str; DUTY_COUNT] = ["duty_motor_1", "duty_motor_2"];
        let mut i = 0;
        let motors = pins.map(|pin| {
            let m = DutyMotor {
                remaining: 0,
                pin: LatchedPin::new(pin, LABELS[i]),
            };
            i += 1;
            m
        });
        Self {
            motors,
            claimed: None,
        }
    }

    /// Add `ticks` to `motor`'s remaining run time.
    pub fn request_run(&mut self, motor: MotorId, ticks: u64) {
        let m = &mut self.motors[motor.index()];
        m.remaining = m.remaining.saturating_add(ticks);
        debug!(motor = motor.get(), ticks, remaining = m.remaining, "run queued");
    }

    /// One scheduling quantum for both motors.
    pub fn tick(&mut self) {
        let claimed = self.claimed.map(MotorId::index);
        for (i, m) in self.motors.iter_mut().enumerate() {
            if claimed == Some(i) {
                m.pin.set(true);
            } else if m.remaining > 0 {
                m.pin.set(true);
                m.remaining -= 1;
            } else if m.pin.is_high() {
                m.pin.set(false);
                debug!(motor = i + 1, "run complete");
            }
        }
    }

    /// Hand `motor` to a calibration session: switch it on now and stop
    /// consuming its counter.
    pub fn claim(&mut self, motor: MotorId) {
        self.claimed = Some(motor);
        self.motors[motor.index()].pin.set(true);
    }

    /// End a calibration claim. The motor keeps running while it still has
    /// dose ticks and switches off otherwise.
    pub fn release(&mut self, motor: MotorId) {
        if self.claimed == Some(motor) {
            self.claimed = None;
        }
        let m = &mut self.motors[motor.index()];
        let keep_on = m.remaining > 0;
        m.pin.set(keep_on);
        debug!(motor = motor.get(), remaining = m.remaining, "calibration claim released");
    }

    pub fn claimed(&self) -> Option<MotorId> {
        self.claimed
    }

    pub fn remaining(&self, motor: MotorId) -> u64 {
        self.motors[motor.index()].remaining
    }

    pub fn is_on(&self, motor: MotorId) -> bool {
        self.motors[motor.index()].pin.is_high()
    }

    /// Outstanding dose ticks, or a motor held on by calibration.
    pub fn has_pending(&self) -> bool {
        self.claimed.is_some() || self.motors.iter().any(|m| m.remaining > 0)
    }

    /// Drive both pins low and drop all remaining ticks.
    pub fn all_off(&mut self) {
        self.claimed = None;
        for m in &mut self.motors {
            m.remaining = 0;
            m.pin.set(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumps_hardware::{PinProbe, SimulatedPin};
    use rstest::rstest;

    fn timer() -> (DutyMotorTimer<SimulatedPin>, [PinProbe; DUTY_COUNT]) {
        let pins = [SimulatedPin::new("m1"), SimulatedPin::new("m2")];
        let probes = [pins[0].probe(), pins[1].probe()];
        (DutyMotorTimer::new(pins), probes)
    }

    fn motor(n: i64) -> MotorId {
        MotorId::new(n).unwrap()
    }

    #[test]
    fn runs_for_requested_ticks_with_two_writes() {
        let (mut t, probes) = timer();
        t.request_run(motor(1), 3);
        for _ in 0..3 {
            t.tick();
            assert!(probes[0].is_high());
        }
        assert_eq!(t.remaining(motor(1)), 0);
        t.tick();
        assert!(!probes[0].is_high());
        for _ in 0..5 {
            t.tick();
        }
        assert_eq!(probes[0].writes(), 2);
        assert_eq!(probes[1].writes(), 0);
    }

    #[test]
    fn requests_are_additive() {
        let (mut t, _) = timer();
        t.request_run(motor(2), 4);
        t.tick();
        t.request_run(motor(2), 4);
        assert_eq!(t.remaining(motor(2)), 7);
    }

    #[test]
    fn claimed_motor_is_observed_not_consumed() {
        let (mut t, probes) = timer();
        t.claim(motor(2));
        assert!(probes[1].is_high());
        assert!(t.has_pending());
        for _ in 0..10 {
            t.tick();
        }
        assert_eq!(t.remaining(motor(2)), 0);
        assert!(probes[1].is_high());
        t.release(motor(2));
        assert!(!probes[1].is_high());
        assert_eq!(t.claimed(), None);
        assert!(!t.has_pending());
        assert_eq!(probes[1].writes(), 2);
    }

    #[rstest]
    #[case::queued_before_claim(3, 0)]
    #[case::queued_during_claim(0, 3)]
    #[case::both(2, 4)]
    fn dose_ticks_survive_a_claim(#[case] before: u64, #[case] during: u64) {
        let (mut t, probes) = timer();
        t.request_run(motor(1), before);
        t.claim(motor(1));
        t.request_run(motor(1), during);
        for _ in 0..5 {
            t.tick();
        }
        assert_eq!(t.remaining(motor(1)), before + during, "frozen while claimed");

        t.release(motor(1));
        assert!(probes[0].is_high(), "keeps running for the queued dose");
        for _ in 0..before + during {
            t.tick();
            assert!(probes[0].is_high());
        }
        t.tick();
        assert!(!probes[0].is_high());
        assert_eq!(probes[0].writes(), 2, "one rise, one fall");
    }

    #[test]
    fn both_motors_tick_together() {
        let (mut t, probes) = timer();
        t.request_run(motor(1), 1);
        t.request_run(motor(2), 2);
        t.tick();
        assert!(probes[0].is_high() && probes[1].is_high());
        t.tick();
        assert!(!probes[0].is_high());
        assert!(probes[1].is_high());
    }
}
