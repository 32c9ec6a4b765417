//! Test and helper mocks for pumps_core

use pumps_traits::{BoxError, RatioStore};

/// A ratio store whose reads return fixed ratios and whose writes always
/// fail; exercises the "calibration result not persisted" path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingRatioStore {
    pub steps_per_ml: u32,
    pub ticks_per_ml: u32,
    /// Fail reads as well.
    pub fail_reads: bool,
}

impl FailingRatioStore {
    fn read(&self, v: u32) -> Result<u32, BoxError> {
        if self.fail_reads {
            Err(Box::new(std::io::Error::other("ratio store unreadable")))
        } else {
            Ok(v)
        }
    }
}

impl RatioStore for FailingRatioStore {
    fn steps_per_ml(&mut self) -> Result<u32, BoxError> {
        self.read(self.steps_per_ml)
    }

    fn set_steps_per_ml(&mut self, _value: u32) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("ratio store read-only")))
    }

    fn ticks_per_ml(&mut self) -> Result<u32, BoxError> {
        self.read(self.ticks_per_ml)
    }

    fn set_ticks_per_ml(&mut self, _value: u32) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("ratio store read-only")))
    }
}
