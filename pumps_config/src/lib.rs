#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration ratio persistence for the pump controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `ratios` persists the steps-per-ml and ticks-per-ml ratios.
use serde::Deserialize;
use std::path::PathBuf;

pub mod ratios;

pub use ratios::{FileRatioStore, MemoryRatioStore, PersistedRatios};

/// Number of stepper pumps on the board.
pub const STEPPER_COUNT: usize = 4;
/// Number of duty-cycled pumps on the board.
pub const DUTY_COUNT: usize = 2;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct StepperPins {
    pub step: u8,
    pub dir: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    /// Shared enable line of the stepper drivers.
    pub enable: u8,
    pub steppers: [StepperPins; STEPPER_COUNT],
    pub duty_motors: [u8; DUTY_COUNT],
    pub stirrer: u8,
    /// Jumper sampled once at startup; when absent `stirrer.enabled` decides.
    pub stirrer_jumper: Option<u8>,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            enable: 8,
            steppers: [
                StepperPins { step: 2, dir: 5 },
                StepperPins { step: 3, dir: 6 },
                StepperPins { step: 4, dir: 7 },
                StepperPins { step: 12, dir: 13 },
            ],
            duty_motors: [9, 10],
            stirrer: 11,
            stirrer_jumper: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StepperCfg {
    /// Steps per second.
    pub max_speed: f32,
    /// Steps per second squared; defaults to `max_speed / 8` when absent.
    pub acceleration: Option<f32>,
    /// Constant speed used while calibrating.
    pub calibration_speed: f32,
    /// Driver boards enable outputs on a low level.
    pub enable_active_low: bool,
}

impl Default for StepperCfg {
    fn default() -> Self {
        Self {
            max_speed: 4000.0,
            acceleration: None,
            calibration_speed: 2500.0,
            enable_active_low: true,
        }
    }
}

impl StepperCfg {
    pub fn effective_acceleration(&self) -> f32 {
        self.acceleration.unwrap_or(self.max_speed / 8.0)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DutyCfg {
    /// Scheduling quantum of the duty motors in milliseconds.
    pub tick_ms: u64,
}

impl Default for DutyCfg {
    fn default() -> Self {
        Self { tick_ms: 100 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StirrerCfg {
    /// Used when no jumper pin is configured.
    pub enabled: bool,
    pub start_delay_ms: u64,
    pub stop_delay_ms: u64,
    pub ping_pulse_ms: u64,
}

impl Default for StirrerCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            start_delay_ms: 5_000,
            stop_delay_ms: 2_000,
            ping_pulse_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Ratio store path.
    pub file: PathBuf,
    /// Target volume used when a calibration command omits it.
    pub default_target_ml: u32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            file: PathBuf::from("etc/ratios.toml"),
            default_target_ml: 300,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunnerCfg {
    /// Sleep between passes that did no work (microseconds, 0 = spin).
    pub idle_sleep_us: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self { idle_sleep_us: 200 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub pins: Pins,
    #[serde(default)]
    pub stepper: StepperCfg,
    #[serde(default)]
    pub duty: DutyCfg,
    #[serde(default)]
    pub stirrer: StirrerCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub runner: RunnerCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Stepper
        if !(self.stepper.max_speed.is_finite() && self.stepper.max_speed > 0.0) {
            eyre::bail!("stepper.max_speed must be > 0");
        }
        let accel = self.stepper.effective_acceleration();
        if !(accel.is_finite() && accel > 0.0) {
            eyre::bail!("stepper.acceleration must be > 0");
        }
        if !(self.stepper.calibration_speed.is_finite() && self.stepper.calibration_speed > 0.0) {
            eyre::bail!("stepper.calibration_speed must be > 0");
        }
        if self.stepper.calibration_speed > self.stepper.max_speed {
            eyre::bail!("stepper.calibration_speed must not exceed stepper.max_speed");
        }

        // Duty
        if self.duty.tick_ms == 0 {
            eyre::bail!("duty.tick_ms must be >= 1");
        }
        if self.duty.tick_ms > 60 * 1000 {
            eyre::bail!("duty.tick_ms is unreasonably large (>1min)");
        }

        // Stirrer
        if self.stirrer.start_delay_ms == 0 {
            eyre::bail!("stirrer.start_delay_ms must be >= 1");
        }
        if self.stirrer.stop_delay_ms == 0 {
            eyre::bail!("stirrer.stop_delay_ms must be >= 1");
        }

        // Calibration
        if self.calibration.default_target_ml == 0 {
            eyre::bail!("calibration.default_target_ml must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        self.validate_pins()
    }

    fn validate_pins(&self) -> eyre::Result<()> {
        let p = &self.pins;
        let mut used: Vec<(u8, &str)> = vec![(p.enable, "pins.enable"), (p.stirrer, "pins.stirrer")];
        for s in &p.steppers {
            used.push((s.step, "pins.steppers.step"));
            used.push((s.dir, "pins.steppers.dir"));
        }
        for m in &p.duty_motors {
            used.push((*m, "pins.duty_motors"));
        }
        if let Some(j) = p.stirrer_jumper {
            used.push((j, "pins.stirrer_jumper"));
        }
        used.sort_by_key(|(pin, _)| *pin);
        for w in used.windows(2) {
            if w[0].0 == w[1].0 {
                eyre::bail!(
                    "pin {} assigned twice ({} and {})",
                    w[0].0,
                    w[0].1,
                    w[1].1
                );
            }
        }
        Ok(())
    }
}
