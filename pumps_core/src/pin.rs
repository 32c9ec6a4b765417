//! Debounced output: writes reach the pin only on a level change.

use pumps_traits::OutputPin;

use crate::hw_error::map_hw_error;

pub struct LatchedPin<P> {
    pin: P,
    label: &'static str,
    /// Last level written successfully; `None` until the first write.
    level: Option<bool>,
}

impl<P: OutputPin> LatchedPin<P> {
    pub fn new(pin: P, label: &'static str) -> Self {
        Self {
            pin,
            label,
            level: None,
        }
    }

    /// Drive the pin to `high` unless it already is. Returns true when the
    /// pin was written. A failed write is logged and retried on the next call.
    pub fn set(&mut self, high: bool) -> bool {
        if self.level == Some(high) {
            return false;
        }
        match self.pin.set_level(high) {
            Ok(()) => {
                self.level = Some(high);
                true
            }
            Err(e) => {
                let err = map_hw_error(&*e);
                tracing::warn!(pin = self.label, high, error = %err, "pin write failed");
                false
            }
        }
    }

    pub fn is_high(&self) -> bool {
        self.level == Some(true)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumps_hardware::SimulatedPin;

    #[test]
    fn repeated_levels_are_not_rewritten() {
        let pin = SimulatedPin::new("t");
        let probe = pin.probe();
        let mut latched = LatchedPin::new(pin, "t");
        assert!(latched.set(false));
        assert!(!latched.set(false));
        assert!(latched.set(true));
        assert!(!latched.set(true));
        assert_eq!(probe.writes(), 2);
        assert!(latched.is_high());
    }

    #[test]
    fn failed_write_is_retried() {
        let pin = SimulatedPin::new("t");
        let probe = pin.probe();
        let mut latched = LatchedPin::new(pin, "t");
        probe.fail_writes(true);
        assert!(!latched.set(true));
        assert!(!latched.is_high());
        probe.fail_writes(false);
        assert!(latched.set(true));
        assert!(probe.is_high());
    }
}
