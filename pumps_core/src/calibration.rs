//! Calibration sessions: `Idle -> Measuring -> Idle`, one per actuator class.
//!
//! A session accumulates raw units (steps or ticks) while an operator
//! collects the liquid; stopping it turns the count into a ratio via
//! [`ratio_from_count`]. Starting a session while one is measuring replaces
//! it: the earlier target and count are discarded.

use crate::ratio::ratio_from_count;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session<Id> {
    pub id: Id,
    pub target_ml: u32,
    pub count: u64,
}

/// What `start` did to any earlier session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Started<Id> {
    Fresh,
    Replaced(Session<Id>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished<Id> {
    pub session: Session<Id>,
    pub ratio: u32,
}

#[derive(Debug)]
pub struct Calibration<Id> {
    active: Option<Session<Id>>,
}

impl<Id> Default for Calibration<Id> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<Id: Copy> Calibration<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin measuring. `target_ml` must be non-zero; callers validate it.
    pub fn start(&mut self, id: Id, target_ml: u32) -> Started<Id> {
        debug_assert!(target_ml > 0);
        let fresh = Session {
            id,
            target_ml,
            count: 0,
        };
        match self.active.replace(fresh) {
            Some(prev) => Started::Replaced(prev),
            None => Started::Fresh,
        }
    }

    /// Account for `n` raw units of the running session.
    pub fn record(&mut self, n: u64) {
        if let Some(s) = self.active.as_mut() {
            s.count = s.count.saturating_add(n);
        }
    }

    /// End the session and compute its ratio. `None` when idle.
    pub fn stop(&mut self) -> Option<Finished<Id>> {
        let session = self.active.take()?;
        let ratio = ratio_from_count(session.count, session.target_ml)?;
        Some(Finished { session, ratio })
    }

    pub fn active(&self) -> Option<&Session<Id>> {
        self.active.as_ref()
    }

    pub fn is_measuring(&self) -> bool {
        self.active.is_some()
    }

    pub fn cancel(&mut self) -> Option<Session<Id>> {
        self.active.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_divides_count_by_target() {
        let mut c = Calibration::new();
        assert_eq!(c.start(3u8, 100), Started::Fresh);
        c.record(12_000);
        c.record(345);
        let done = c.stop().unwrap();
        assert_eq!(done.ratio, 123);
        assert_eq!(done.session.id, 3);
        assert!(!c.is_measuring());
    }

    #[test]
    fn second_start_replaces_and_resets_count() {
        let mut c = Calibration::new();
        c.start(1u8, 300);
        c.record(50);
        match c.start(2u8, 100) {
            Started::Replaced(prev) => {
                assert_eq!(prev.id, 1);
                assert_eq!(prev.count, 50);
            }
            Started::Fresh => panic!("expected replacement"),
        }
        let s = c.active().unwrap();
        assert_eq!((s.id, s.target_ml, s.count), (2, 100, 0));
    }

    #[test]
    fn stop_without_session_is_none() {
        let mut c: Calibration<u8> = Calibration::new();
        assert!(c.stop().is_none());
        c.record(10);
        assert!(c.active().is_none());
    }
}
