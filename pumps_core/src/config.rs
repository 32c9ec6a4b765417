//! Runtime configuration of the coordination engine.
//!
//! These are separate from the TOML-deserialized config in `pumps_config`;
//! see `conversions` for the bridge.

use crate::stirrer::StirrerTiming;

/// Motion profile applied to every stepper.
#[derive(Debug, Clone, Copy)]
pub struct StepperProfile {
    /// Steps per second.
    pub max_speed: f32,
    /// Steps per second squared.
    pub acceleration: f32,
    /// Constant speed while calibrating.
    pub calibration_speed: f32,
}

impl Default for StepperProfile {
    fn default() -> Self {
        Self {
            max_speed: 4000.0,
            acceleration: 500.0,
            calibration_speed: 2500.0,
        }
    }
}

impl Default for StirrerTiming {
    fn default() -> Self {
        Self {
            start_delay_ms: 5_000,
            stop_delay_ms: 2_000,
            ping_pulse_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CoreCfg {
    pub stepper: StepperProfile,
    /// Duty motor scheduling quantum.
    pub tick_ms: u64,
    pub stirrer: StirrerTiming,
    /// Whether stirrer coordination is active. A jumper sampled by the
    /// builder overrides this.
    pub stirrer_enabled: bool,
    /// Calibration target used when a command omits it.
    pub default_target_ml: u32,
}

impl Default for CoreCfg {
    fn default() -> Self {
        Self {
            stepper: StepperProfile::default(),
            tick_ms: 100,
            stirrer: StirrerTiming::default(),
            stirrer_enabled: true,
            default_target_ml: 300,
        }
    }
}

impl CoreCfg {
    /// Reject values the engine cannot run with.
    pub(crate) fn check(&self) -> Result<(), &'static str> {
        let s = &self.stepper;
        if !(s.max_speed.is_finite() && s.max_speed > 0.0) {
            return Err("stepper max speed must be > 0");
        }
        if !(s.acceleration.is_finite() && s.acceleration > 0.0) {
            return Err("stepper acceleration must be > 0");
        }
        if !(s.calibration_speed.is_finite() && s.calibration_speed > 0.0) {
            return Err("calibration speed must be > 0");
        }
        if self.tick_ms == 0 {
            return Err("duty tick must be >= 1 ms");
        }
        if self.stirrer.start_delay_ms == 0 || self.stirrer.stop_delay_ms == 0 {
            return Err("stirrer delays must be >= 1 ms");
        }
        if self.default_target_ml == 0 {
            return Err("default calibration target must be >= 1 ml");
        }
        Ok(())
    }
}
