//! Builder for `DoserCore`.
//!
//! Every actuator part is mandatory; `build()` reports the first missing
//! one as a [`BuildError`]. Configuration and clock default when not given.

use std::sync::Arc;

use pumps_traits::{Clock, InputPin, MonotonicClock, OutputPin, RatioStore, Stepper};
use tracing::{info, warn};

use crate::calibration::Calibration;
use crate::config::CoreCfg;
use crate::engine::DoserCore;
use crate::duty::DutyMotorTimer;
use crate::error::{BuildError, Result};
use crate::hw_error::map_hw_error;
use crate::scheduler::ActuatorScheduler;
use crate::stirrer::StirrerCoordinator;
use crate::timers::{TaskKind, TimerQueue};
use crate::types::{DUTY_COUNT, STEPPER_COUNT};

pub struct DoserBuilder<S, P, R> {
    steppers: Option<[S; STEPPER_COUNT]>,
    enable: Option<P>,
    duty: Option<[P; DUTY_COUNT]>,
    stirrer: Option<P>,
    store: Option<R>,
    cfg: Option<CoreCfg>,
    stirrer_enabled: Option<bool>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl<S, P, R> Default for DoserBuilder<S, P, R> {
    fn default() -> Self {
        Self {
            steppers: None,
            enable: None,
            duty: None,
            stirrer: None,
            store: None,
            cfg: None,
            stirrer_enabled: None,
            clock: None,
        }
    }
}

impl<S: Stepper, P: OutputPin, R: RatioStore> DoserBuilder<S, P, R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steppers(mut self, steppers: [S; STEPPER_COUNT]) -> Self {
        self.steppers = Some(steppers);
        self
    }

    /// Shared driver-enable line; `true` on the pin means enabled.
    pub fn with_enable_pin(mut self, pin: P) -> Self {
        self.enable = Some(pin);
        self
    }

    pub fn with_duty_pins(mut self, pins: [P; DUTY_COUNT]) -> Self {
        self.duty = Some(pins);
        self
    }

    pub fn with_stirrer_pin(mut self, pin: P) -> Self {
        self.stirrer = Some(pin);
        self
    }

    pub fn with_ratio_store(mut self, store: R) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, cfg: CoreCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Override `CoreCfg::stirrer_enabled`.
    pub fn with_stirrer_enabled(mut self, enabled: bool) -> Self {
        self.stirrer_enabled = Some(enabled);
        self
    }

    /// Sample the stirrer jumper once. A closed jumper (high) enables stirrer
    /// coordination. On a read failure the configured value is kept.
    pub fn sample_stirrer_jumper(mut self, jumper: &impl InputPin) -> Self {
        match jumper.is_high() {
            Ok(level) => {
                info!(enabled = level, "stirrer jumper sampled");
                self.stirrer_enabled = Some(level);
            }
            Err(e) => {
                warn!(error = %map_hw_error(&*e), "stirrer jumper unreadable; using config");
            }
        }
        self
    }

    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<DoserCore<S, P, R>> {
        let DoserBuilder {
            steppers,
            enable,
            duty,
            stirrer,
            store,
            cfg,
            stirrer_enabled,
            clock,
        } = self;

        let steppers = steppers.ok_or_else(|| eyre::Report::new(BuildError::MissingSteppers))?;
        let enable = enable.ok_or_else(|| eyre::Report::new(BuildError::MissingEnablePin))?;
        let duty = duty.ok_or_else(|| eyre::Report::new(BuildError::MissingDutyPins))?;
        let stirrer = stirrer.ok_or_else(|| eyre::Report::new(BuildError::MissingStirrerPin))?;
        let store = store.ok_or_else(|| eyre::Report::new(BuildError::MissingRatioStore))?;

        let cfg = cfg.unwrap_or_default();
        cfg.check()
            .map_err(|msg| eyre::Report::new(BuildError::InvalidConfig(msg)))?;
        let stirrer_enabled = stirrer_enabled.unwrap_or(cfg.stirrer_enabled);
        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };

        let mut scheduler = ActuatorScheduler::new(steppers, enable);
        scheduler.configure(cfg.stepper.max_speed, cfg.stepper.acceleration);

        let epoch = clock.now();
        let mut timers = TimerQueue::new();
        timers.arm(TaskKind::DutyTick, 0, cfg.tick_ms);

        Ok(DoserCore {
            scheduler,
            duty: DutyMotorTimer::new(duty),
            stirrer: StirrerCoordinator::new(stirrer, stirrer_enabled, cfg.stirrer),
            stepper_cal: Calibration::new(),
            duty_cal: Calibration::new(),
            timers,
            store,
            cfg,
            clock,
            epoch,
        })
    }
}
