//! Maps `Box<dyn Error>` from trait boundaries to typed `PumpsError`.
//!
//! The traits in `pumps_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `pumps_hardware::HwError`.

use crate::error::PumpsError;

/// Map a trait-boundary error from an actuator to a typed `PumpsError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> PumpsError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<pumps_hardware::HwError>() {
            return match hw {
                pumps_hardware::HwError::Io(_) => PumpsError::Hardware(hw.to_string()),
                other => PumpsError::HardwareFault(other.to_string()),
            };
        }
    }

    PumpsError::Hardware(e.to_string())
}

/// Map a trait-boundary error from the ratio store.
pub fn map_store_error(e: &(dyn std::error::Error + 'static)) -> PumpsError {
    PumpsError::Persist(e.to_string())
}
