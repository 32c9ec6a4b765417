//! `From` implementations bridging `pumps_config` types to `pumps_core` types.

use crate::config::{CoreCfg, StepperProfile};
use crate::stirrer::StirrerTiming;

impl From<&pumps_config::StepperCfg> for StepperProfile {
    fn from(c: &pumps_config::StepperCfg) -> Self {
        Self {
            max_speed: c.max_speed,
            acceleration: c.effective_acceleration(),
            calibration_speed: c.calibration_speed,
        }
    }
}

impl From<&pumps_config::StirrerCfg> for StirrerTiming {
    fn from(c: &pumps_config::StirrerCfg) -> Self {
        Self {
            start_delay_ms: c.start_delay_ms,
            stop_delay_ms: c.stop_delay_ms,
            ping_pulse_ms: c.ping_pulse_ms,
        }
    }
}

impl From<&pumps_config::Config> for CoreCfg {
    fn from(c: &pumps_config::Config) -> Self {
        Self {
            stepper: StepperProfile::from(&c.stepper),
            tick_ms: c.duty.tick_ms,
            stirrer: StirrerTiming::from(&c.stirrer),
            stirrer_enabled: c.stirrer.enabled,
            default_target_ml: c.calibration.default_target_ml,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_agree_with_file_defaults() {
        let from_file = CoreCfg::from(&pumps_config::Config::default());
        let built_in = CoreCfg::default();
        assert_eq!(from_file.tick_ms, built_in.tick_ms);
        assert_eq!(from_file.stepper.max_speed, built_in.stepper.max_speed);
        assert_eq!(from_file.stepper.acceleration, built_in.stepper.acceleration);
        assert_eq!(
            from_file.stirrer.start_delay_ms,
            built_in.stirrer.start_delay_ms
        );
        assert_eq!(from_file.default_target_ml, 300);
    }

    #[test]
    fn explicit_acceleration_wins() {
        let mut c = pumps_config::Config::default();
        c.stepper.acceleration = Some(1200.0);
        assert_eq!(CoreCfg::from(&c).stepper.acceleration, 1200.0);
    }
}
