//! Stirrer Coordinator.
//!
//! Keeps liquid mixing whenever a pump works, without toggling the stirrer
//! relay on short gaps between doses:
//!
//! ```text
//!   Idle/Active/StopDelay --dose--> StartDelay --start timer--> Active
//!   Active --all actuators idle--> StopDelay --stop timer--> Idle
//! ```
//!
//! While the start-delay is pending the engine holds back every actuator, so
//! stirring always precedes dosing. With the hardware jumper open the
//! coordinator is bypassed entirely. Ping pulses share the output but use
//! their own timer.

use core::fmt;

use pumps_traits::OutputPin;
use tracing::debug;

use crate::pin::LatchedPin;
use crate::timers::{TaskKind, TimerQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StirrerState {
    Idle,
    StartDelay,
    Active,
    StopDelay,
}

impl fmt::Display for StirrerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::StartDelay => "start-delay",
            Self::Active => "active",
            Self::StopDelay => "stop-delay",
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StirrerTiming {
    pub start_delay_ms: u64,
    pub stop_delay_ms: u64,
    pub ping_pulse_ms: u64,
}

pub struct StirrerCoordinator<P> {
    output: LatchedPin<P>,
    enabled: bool,
    active: bool,
    start_pending: bool,
    stop_pending: bool,
    timing: StirrerTiming,
}

impl<P: OutputPin> StirrerCoordinator<P> {
    pub fn new(pin: P, enabled: bool, timing: StirrerTiming) -> Self {
        Self {
            output: LatchedPin::new(pin, "stirrer"),
            enabled,
            active: false,
            start_pending: false,
            stop_pending: false,
            timing,
        }
    }

    /// A dose was accepted: stir now and hold dosing for the start-delay.
    /// Re-arming restarts the window.
    pub fn dose_requested(&mut self, timers: &mut TimerQueue, now_ms: u64) {
        if !self.enabled {
            return;
        }
        if self.stop_pending {
            timers.cancel(TaskKind::StirrerStop);
            self.stop_pending = false;
        }
        self.output.set(true);
        self.active = true;
        self.start_pending = true;
        timers.arm(TaskKind::StirrerStart, now_ms, self.timing.start_delay_ms);
        debug!(state = %self.state(), "stirrer start-delay armed");
    }

    pub fn start_elapsed(&mut self) {
        self.start_pending = false;
        debug!(state = %self.state(), "stirrer start-delay elapsed");
    }

    /// Arm the stop-delay once no actuator has outstanding work.
    /// Returns true when the timer was armed by this call.
    pub fn evaluate_stop(
        &mut self,
        actuators_idle: bool,
        timers: &mut TimerQueue,
        now_ms: u64,
    ) -> bool {
        if !(self.enabled
            && actuators_idle
            && self.active
            && !self.start_pending
            && !self.stop_pending)
        {
            return false;
        }
        self.stop_pending = true;
        timers.arm(TaskKind::StirrerStop, now_ms, self.timing.stop_delay_ms);
        debug!(state = %self.state(), "stirrer stop-delay armed");
        true
    }

    /// Stop-delay over. A ping pulse still in flight keeps the output on
    /// until its own timer ends it.
    pub fn stop_elapsed(&mut self, timers: &TimerQueue) {
        if !timers.is_armed(TaskKind::PingOff) {
            self.output.set(false);
        }
        self.active = false;
        self.stop_pending = false;
        self.start_pending = false;
        debug!(state = %self.state(), "stirrer off");
    }

    /// Pulse the output for the ping duration, whatever the dosing state.
    pub fn ping(&mut self, timers: &mut TimerQueue, now_ms: u64) {
        self.output.set(true);
        timers.arm(TaskKind::PingOff, now_ms, self.timing.ping_pulse_ms);
    }

    /// End of a ping pulse. The output stays on while the coordinator is
    /// stirring for a dose.
    pub fn ping_elapsed(&mut self) {
        if !self.active {
            self.output.set(false);
        }
    }

    /// Holds back actuator advancement.
    pub fn suppresses_dosing(&self) -> bool {
        self.start_pending
    }

    pub fn state(&self) -> StirrerState {
        match (self.active, self.start_pending, self.stop_pending) {
            (_, true, _) => StirrerState::StartDelay,
            (_, _, true) => StirrerState::StopDelay,
            (true, false, false) => StirrerState::Active,
            (false, false, false) => StirrerState::Idle,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_on(&self) -> bool {
        self.output.is_high()
    }

    /// Switch off and forget any pending delay.
    pub fn force_off(&mut self, timers: &mut TimerQueue) {
        timers.cancel(TaskKind::StirrerStart);
        timers.cancel(TaskKind::StirrerStop);
        timers.cancel(TaskKind::PingOff);
        self.active = false;
        self.start_pending = false;
        self.stop_pending = false;
        self.output.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumps_hardware::{PinProbe, SimulatedPin};

    const TIMING: StirrerTiming = StirrerTiming {
        start_delay_ms: 5,
        stop_delay_ms: 2,
        ping_pulse_ms: 1,
    };

    fn coordinator(enabled: bool) -> (StirrerCoordinator<SimulatedPin>, PinProbe, TimerQueue) {
        let pin = SimulatedPin::new("stir");
        let probe = pin.probe();
        (
            StirrerCoordinator::new(pin, enabled, TIMING),
            probe,
            TimerQueue::new(),
        )
    }

    #[test]
    fn full_cycle() {
        let (mut s, probe, mut q) = coordinator(true);
        assert_eq!(s.state(), StirrerState::Idle);

        s.dose_requested(&mut q, 0);
        assert_eq!(s.state(), StirrerState::StartDelay);
        assert!(probe.is_high());
        assert!(s.suppresses_dosing());
        assert!(!s.evaluate_stop(true, &mut q, 1), "no stop during start-delay");

        assert_eq!(q.pop_due(5).map(|d| d.kind), Some(TaskKind::StirrerStart));
        s.start_elapsed();
        assert_eq!(s.state(), StirrerState::Active);

        assert!(!s.evaluate_stop(false, &mut q, 6), "busy actuators keep it on");
        assert!(s.evaluate_stop(true, &mut q, 6));
        assert!(!s.evaluate_stop(true, &mut q, 7), "already armed");
        assert_eq!(s.state(), StirrerState::StopDelay);

        assert_eq!(q.pop_due(8).map(|d| d.kind), Some(TaskKind::StirrerStop));
        s.stop_elapsed(&q);
        assert_eq!(s.state(), StirrerState::Idle);
        assert!(!probe.is_high());
        assert_eq!(probe.rises(), 1);
    }

    #[test]
    fn dose_during_stop_delay_cancels_it() {
        let (mut s, probe, mut q) = coordinator(true);
        s.dose_requested(&mut q, 0);
        q.pop_due(5);
        s.start_elapsed();
        s.evaluate_stop(true, &mut q, 5);
        s.dose_requested(&mut q, 6);
        assert!(!q.is_armed(TaskKind::StirrerStop));
        assert_eq!(s.state(), StirrerState::StartDelay);
        assert_eq!(probe.writes(), 1, "stirrer stays on without extra writes");
    }

    #[test]
    fn rearming_start_delay_moves_deadline() {
        let (mut s, _, mut q) = coordinator(true);
        s.dose_requested(&mut q, 0);
        s.dose_requested(&mut q, 3);
        assert_eq!(q.len(), 1);
        assert_eq!(q.deadline(TaskKind::StirrerStart), Some(8));
    }

    #[test]
    fn disabled_coordinator_is_bypassed() {
        let (mut s, probe, mut q) = coordinator(false);
        s.dose_requested(&mut q, 0);
        assert_eq!(s.state(), StirrerState::Idle);
        assert!(!s.suppresses_dosing());
        assert!(q.is_empty());
        assert_eq!(probe.writes(), 0);
    }

    #[test]
    fn ping_pulses_even_when_disabled() {
        let (mut s, probe, mut q) = coordinator(false);
        s.ping(&mut q, 0);
        assert!(probe.is_high());
        assert_eq!(q.pop_due(1).map(|d| d.kind), Some(TaskKind::PingOff));
        s.ping_elapsed();
        assert!(!probe.is_high());
    }

    #[test]
    fn ping_end_does_not_cut_active_stirring() {
        let (mut s, probe, mut q) = coordinator(true);
        s.ping(&mut q, 0);
        s.dose_requested(&mut q, 0);
        s.ping_elapsed();
        assert!(probe.is_high());
    }

    #[test]
    fn stop_delay_leaves_a_ping_pulse_running() {
        let (mut s, probe, mut q) = coordinator(true);
        s.dose_requested(&mut q, 0);
        q.pop_due(5);
        s.start_elapsed();
        assert!(s.evaluate_stop(true, &mut q, 5));
        // Pulse ends at 10, stop-delay at 7.
        s.ping(&mut q, 9);

        assert_eq!(q.pop_due(7).map(|d| d.kind), Some(TaskKind::StirrerStop));
        s.stop_elapsed(&q);
        assert_eq!(s.state(), StirrerState::Idle);
        assert!(probe.is_high(), "pulse is not cut short");

        assert_eq!(q.pop_due(10).map(|d| d.kind), Some(TaskKind::PingOff));
        s.ping_elapsed();
        assert!(!probe.is_high());
        assert_eq!(probe.rises(), 1);
    }
}
