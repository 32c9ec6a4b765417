//! Dosing engine: owns every actuator state machine and runs one control
//! loop pass at a time.
//!
//! Pass order is fixed:
//!
//! 1. fire due timers (stirrer delays, ping pulse end, duty ticks);
//! 2. evaluate the stirrer stop condition;
//! 3. unless the stirrer start-delay is pending, apply due duty ticks and
//!    drive at most one stepper;
//!
//! Command intake follows the pass and lives in the runner. All entry points
//! validate before mutating, so a rejected request has no side effect.

use std::sync::Arc;
use std::time::Instant;

use pumps_traits::{Clock, OutputPin, RatioStore, Stepper};
use tracing::{debug, error, info, trace, warn};

use crate::calibration::{Calibration, Started};
use crate::command::{Command, Reply};
use crate::config::CoreCfg;
use crate::duty::DutyMotorTimer;
use crate::error::PumpsError;
use crate::hw_error::map_store_error;
use crate::ratio::{volume_to_steps, volume_to_ticks};
use crate::scheduler::ActuatorScheduler;
use crate::status::{
    DutySnapshot, PassReport, SessionSnapshot, Snapshot, StepperSnapshot, StirrerState,
};
use crate::stirrer::StirrerCoordinator;
use crate::timers::{TaskKind, TimerQueue};
use crate::types::{ActuatorClass, MotorId, PumpId};

/// Result of a calibration switch command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationEvent {
    Started,
    /// Session ended; `ratio` is what was persisted.
    Stopped { ratio: u32 },
}

pub struct DoserCore<S, P, R> {
    pub(crate) scheduler: ActuatorScheduler<S, P>,
    pub(crate) duty: DutyMotorTimer<P>,
    pub(crate) stirrer: StirrerCoordinator<P>,
    pub(crate) stepper_cal: Calibration<PumpId>,
    pub(crate) duty_cal: Calibration<MotorId>,
    pub(crate) timers: TimerQueue,
    pub(crate) store: R,
    pub(crate) cfg: CoreCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
}

impl<S, P, R> core::fmt::Debug for DoserCore<S, P, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DoserCore")
            .field("cfg", &self.cfg)
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

fn check_target(target_ml: i64) -> Result<u32, PumpsError> {
    match u32::try_from(target_ml) {
        Ok(t) if t > 0 => Ok(t),
        _ => Err(PumpsError::InvalidTarget(target_ml)),
    }
}

impl<S: Stepper, P: OutputPin, R: RatioStore> DoserCore<S, P, R> {
    /// Milliseconds since the engine was built.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    pub fn cfg(&self) -> &CoreCfg {
        &self.cfg
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Queue `ml` on a stepper pump. Negative volumes run the pump backwards.
    /// Returns the steps added to the pump's pending distance.
    pub fn dose_stepper(&mut self, pump: i64, ml: f32) -> Result<i64, PumpsError> {
        let pump = PumpId::new(pump)?;
        if !ml.is_finite() {
            return Err(PumpsError::InvalidVolume(ml));
        }
        let ratio = self
            .store
            .steps_per_ml()
            .map_err(|e| map_store_error(&*e))?;
        let steps = volume_to_steps(ml, ratio);

        let now = self.now_ms();
        self.stirrer.dose_requested(&mut self.timers, now);
        self.scheduler.request_move(pump, steps);
        info!(pump = pump.get(), ml, steps, ratio, "stepper dose queued");
        Ok(steps)
    }

    /// Queue `ml` on a duty motor. Returns the ticks added.
    pub fn dose_motor(&mut self, motor: i64, ml: f32) -> Result<u64, PumpsError> {
        let motor = MotorId::new(motor)?;
        if !(ml.is_finite() && ml > 0.0) {
            return Err(PumpsError::InvalidVolume(ml));
        }
        let ratio = self
            .store
            .ticks_per_ml()
            .map_err(|e| map_store_error(&*e))?;
        let ticks = volume_to_ticks(ml, ratio);

        let now = self.now_ms();
        self.stirrer.dose_requested(&mut self.timers, now);
        self.duty.request_run(motor, ticks);
        info!(motor = motor.get(), ml, ticks, ratio, "motor dose queued");
        Ok(ticks)
    }

    pub fn set_stepper_calibration(
        &mut self,
        pump: i64,
        on: bool,
        target_ml: i64,
    ) -> Result<CalibrationEvent, PumpsError> {
        if on {
            self.start_stepper_calibration(pump, target_ml)
                .map(|()| CalibrationEvent::Started)
        } else {
            self.stop_stepper_calibration(pump)
                .map(|ratio| CalibrationEvent::Stopped { ratio })
        }
    }

    /// Run `pump` at the calibration speed and count its steps. A session
    /// already measuring is abandoned without persisting anything.
    pub fn start_stepper_calibration(&mut self, pump: i64, target_ml: i64) -> Result<(), PumpsError> {
        let pump = PumpId::new(pump)?;
        let target_ml = check_target(target_ml)?;

        if let Started::Replaced(prev) = self.stepper_cal.start(pump, target_ml) {
            warn!(
                previous = prev.id.get(),
                discarded_steps = prev.count,
                pump = pump.get(),
                "stepper calibration replaced a running session"
            );
            self.scheduler.halt_and_zero(prev.id);
        }
        self.scheduler
            .set_constant_speed(pump, self.cfg.stepper.calibration_speed);
        self.scheduler.enable_outputs();
        info!(pump = pump.get(), target_ml, "stepper calibration started");
        Ok(())
    }

    /// End the stepper session, persist steps/ml and zero the pump.
    pub fn stop_stepper_calibration(&mut self, pump: i64) -> Result<u32, PumpsError> {
        let pump = PumpId::new(pump)?;
        let finished = self
            .stepper_cal
            .stop()
            .ok_or(PumpsError::NoCalibrationSession(ActuatorClass::Stepper))?;
        let session = finished.session;
        if session.id != pump {
            warn!(
                requested = pump.get(),
                pump = session.id.get(),
                "stop names another pump; ending the running session"
            );
        }
        self.scheduler.halt_and_zero(session.id);

        if let Err(e) = self.store.set_steps_per_ml(finished.ratio) {
            error!(error = %map_store_error(&*e), ratio = finished.ratio, "steps/ml not persisted");
        }
        info!(
            pump = session.id.get(),
            steps = session.count,
            target_ml = session.target_ml,
            ratio = finished.ratio,
            "stepper calibration complete"
        );
        Ok(finished.ratio)
    }

    pub fn set_motor_calibration(
        &mut self,
        motor: i64,
        on: bool,
        target_ml: i64,
    ) -> Result<CalibrationEvent, PumpsError> {
        if on {
            self.start_motor_calibration(motor, target_ml)
                .map(|()| CalibrationEvent::Started)
        } else {
            self.stop_motor_calibration(motor)
                .map(|ratio| CalibrationEvent::Stopped { ratio })
        }
    }

    /// Switch `motor` on and count duty ticks until stopped.
    pub fn start_motor_calibration(&mut self, motor: i64, target_ml: i64) -> Result<(), PumpsError> {
        let motor = MotorId::new(motor)?;
        let target_ml = check_target(target_ml)?;

        if let Started::Replaced(prev) = self.duty_cal.start(motor, target_ml) {
            warn!(
                previous = prev.id.get(),
                discarded_ticks = prev.count,
                motor = motor.get(),
                "motor calibration replaced a running session"
            );
            self.duty.release(prev.id);
        }
        self.duty.claim(motor);
        info!(motor = motor.get(), target_ml, "motor calibration started");
        Ok(())
    }

    /// End the motor session, persist ticks/ml and switch the motor off.
    pub fn stop_motor_calibration(&mut self, motor: i64) -> Result<u32, PumpsError> {
        let motor = MotorId::new(motor)?;
        let finished = self
            .duty_cal
            .stop()
            .ok_or(PumpsError::NoCalibrationSession(ActuatorClass::Duty))?;
        let session = finished.session;
        if session.id != motor {
            warn!(
                requested = motor.get(),
                motor = session.id.get(),
                "stop names another motor; ending the running session"
            );
        }
        self.duty.release(session.id);

        if let Err(e) = self.store.set_ticks_per_ml(finished.ratio) {
            error!(error = %map_store_error(&*e), ratio = finished.ratio, "ticks/ml not persisted");
        }
        info!(
            motor = session.id.get(),
            ticks = session.count,
            target_ml = session.target_ml,
            ratio = finished.ratio,
            "motor calibration complete"
        );
        Ok(finished.ratio)
    }

    /// Pulse the stirrer output.
    pub fn ping(&mut self) {
        let now = self.now_ms();
        self.stirrer.ping(&mut self.timers, now);
        debug!("ping");
    }

    /// Zero every stepper position. Pending distances and ratios are kept.
    pub fn reset_positions(&mut self) {
        self.scheduler.reset_positions();
        if let Some(s) = self.stepper_cal.active() {
            // Zeroing drops the constant speed of a calibrating pump.
            let id = s.id;
            self.scheduler
                .set_constant_speed(id, self.cfg.stepper.calibration_speed);
        }
        info!("stepper positions reset");
    }

    /// One control loop pass.
    pub fn pass(&mut self) -> PassReport {
        let now = self.now_ms();
        let mut report = PassReport::default();
        let mut due_ticks: u32 = 0;

        while let Some(due) = self.timers.pop_due(now) {
            report.timers_fired += 1;
            match due.kind {
                TaskKind::StirrerStart => self.stirrer.start_elapsed(),
                TaskKind::StirrerStop => self.stirrer.stop_elapsed(&self.timers),
                TaskKind::PingOff => self.stirrer.ping_elapsed(),
                TaskKind::DutyTick => {
                    due_ticks = due_ticks.saturating_add(1);
                    self.timers.arm_at(
                        TaskKind::DutyTick,
                        due.deadline_ms.saturating_add(self.cfg.tick_ms),
                    );
                }
            }
        }

        let actuators_idle = !self.scheduler.has_pending() && !self.duty.has_pending();
        self.stirrer
            .evaluate_stop(actuators_idle, &mut self.timers, now);

        if self.stirrer.suppresses_dosing() {
            report.suppressed = true;
            if due_ticks > 0 {
                // A claimed motor is already running, so its session keeps counting.
                self.duty_cal.record(u64::from(due_ticks));
                trace!(due_ticks, "duty ticks held during start-delay");
            }
            return report;
        }

        for _ in 0..due_ticks {
            self.duty.tick();
            self.duty_cal.record(1);
        }
        report.duty_ticks = due_ticks;

        report.stepped = match self.stepper_cal.active().map(|s| s.id) {
            Some(pump) => {
                if self.scheduler.run_constant(pump) {
                    self.stepper_cal.record(1);
                    Some(pump)
                } else {
                    None
                }
            }
            None => self.scheduler.advance(),
        };

        trace!(
            stepped = report.stepped.map(PumpId::get),
            duty_ticks = report.duty_ticks,
            timers = report.timers_fired,
            "pass"
        );
        report
    }

    /// Parse and dispatch one protocol line. A rejected line is logged and
    /// leaves every actuator untouched.
    pub fn execute(&mut self, line: &str) -> Result<Option<Reply>, PumpsError> {
        let result = Command::parse_with_default(line, self.cfg.default_target_ml)
            .map_err(PumpsError::from)
            .and_then(|cmd| self.apply(cmd));
        if let Err(e) = &result {
            warn!(line = line.trim_end(), error = %e, "command rejected");
        }
        result
    }

    pub fn apply(&mut self, cmd: Command) -> Result<Option<Reply>, PumpsError> {
        match cmd {
            Command::DoseStepper { pump, ml } => {
                self.dose_stepper(pump, ml)?;
                Ok(Some(Reply::Dosed))
            }
            Command::StepperCalibration {
                pump,
                on,
                target_ml,
            } => {
                self.set_stepper_calibration(pump, on, target_ml)?;
                Ok(None)
            }
            Command::Ping => {
                self.ping();
                Ok(Some(Reply::Pong))
            }
            Command::Reset => {
                self.reset_positions();
                Ok(Some(Reply::Reset))
            }
            Command::DoseMotor { motor, ml } => {
                self.dose_motor(motor, ml)?;
                Ok(Some(Reply::Dosed))
            }
            Command::MotorCalibration {
                motor,
                on,
                target_ml,
            } => {
                self.set_motor_calibration(motor, on, target_ml)?;
                Ok(None)
            }
        }
    }

    /// No outstanding work: no pending distance or ticks, no calibration
    /// session, stirrer idle and no ping pulse in flight.
    pub fn is_idle(&self) -> bool {
        !self.scheduler.has_pending()
            && !self.duty.has_pending()
            && !self.stepper_cal.is_measuring()
            && !self.duty_cal.is_measuring()
            && self.stirrer.state() == StirrerState::Idle
            && !self.timers.is_armed(TaskKind::PingOff)
    }

    pub fn stirrer_state(&self) -> StirrerState {
        self.stirrer.state()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            steppers: std::array::from_fn(|i| {
                let pump = PumpId::from_index(i);
                StepperSnapshot {
                    pending: self.scheduler.pending(pump),
                    position: self.scheduler.position(pump),
                }
            }),
            duty: std::array::from_fn(|i| {
                let motor = MotorId::from_index(i);
                DutySnapshot {
                    remaining_ticks: self.duty.remaining(motor),
                    on: self.duty.is_on(motor),
                }
            }),
            drivers_enabled: self.scheduler.outputs_enabled(),
            stirrer_enabled: self.stirrer.is_enabled(),
            stirrer: self.stirrer.state(),
            stirrer_on: self.stirrer.is_on(),
            stepper_calibration: self.stepper_cal.active().map(|s| SessionSnapshot {
                id: s.id,
                target_ml: s.target_ml,
                count: s.count,
            }),
            motor_calibration: self.duty_cal.active().map(|s| SessionSnapshot {
                id: s.id,
                target_ml: s.target_ml,
                count: s.count,
            }),
        }
    }

    /// Drive every output low and drop all outstanding work. Calibration
    /// sessions are abandoned without persisting.
    pub fn shutdown(&mut self) {
        if let Some(s) = self.stepper_cal.cancel() {
            warn!(pump = s.id.get(), "stepper calibration abandoned at shutdown");
            self.scheduler.halt_and_zero(s.id);
        }
        if let Some(s) = self.duty_cal.cancel() {
            warn!(motor = s.id.get(), "motor calibration abandoned at shutdown");
        }
        self.scheduler.abandon_all();
        self.duty.all_off();
        self.stirrer.force_off(&mut self.timers);
        self.scheduler.disable_outputs();
        info!("outputs off");
    }
}
