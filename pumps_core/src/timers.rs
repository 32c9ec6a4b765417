//! One-shot task queue keyed by task kind.
//!
//! At most one timer of each kind is outstanding: arming a kind replaces any
//! pending timer of the same kind. Deadlines are milliseconds on the engine's
//! monotonic timeline.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Stirrer start-delay elapsed; dosing may proceed.
    StirrerStart,
    /// Stirrer stop-delay elapsed; switch the stirrer off.
    StirrerStop,
    /// End of a ping pulse.
    PingOff,
    /// Duty motor scheduling quantum. Re-armed by the engine on every firing.
    DutyTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Due {
    pub kind: TaskKind,
    pub deadline_ms: u64,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    pending: Vec<Due>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` to fire `delay_ms` after `now_ms`, cancelling any pending
    /// timer of the same kind.
    pub fn arm(&mut self, kind: TaskKind, now_ms: u64, delay_ms: u64) {
        self.arm_at(kind, now_ms.saturating_add(delay_ms));
    }

    pub fn arm_at(&mut self, kind: TaskKind, deadline_ms: u64) {
        self.cancel(kind);
        self.pending.push(Due { kind, deadline_ms });
    }

    /// Returns true when a pending timer was removed.
    pub fn cancel(&mut self, kind: TaskKind) -> bool {
        let before = self.pending.len();
        self.pending.retain(|d| d.kind != kind);
        before != self.pending.len()
    }

    pub fn is_armed(&self, kind: TaskKind) -> bool {
        self.pending.iter().any(|d| d.kind == kind)
    }

    pub fn deadline(&self, kind: TaskKind) -> Option<u64> {
        self.pending
            .iter()
            .find(|d| d.kind == kind)
            .map(|d| d.deadline_ms)
    }

    /// Remove and return the earliest timer whose deadline is `<= now_ms`.
    /// Ties fire in arming order.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Due> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, d)| d.deadline_ms <= now_ms)
            .min_by_key(|(i, d)| (d.deadline_ms, *i))
            .map(|(i, _)| i)?;
        Some(self.pending.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_replaces_same_kind() {
        let mut q = TimerQueue::new();
        q.arm(TaskKind::StirrerStart, 0, 5);
        q.arm(TaskKind::StirrerStart, 3, 5);
        assert_eq!(q.len(), 1);
        assert_eq!(q.deadline(TaskKind::StirrerStart), Some(8));
        assert_eq!(q.pop_due(5), None);
        assert_eq!(q.pop_due(8).map(|d| d.kind), Some(TaskKind::StirrerStart));
        assert!(q.is_empty());
    }

    #[test]
    fn different_kinds_coexist() {
        let mut q = TimerQueue::new();
        q.arm(TaskKind::StirrerStop, 0, 2);
        q.arm(TaskKind::PingOff, 0, 1);
        q.arm(TaskKind::DutyTick, 0, 10);
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop_due(2).map(|d| d.kind), Some(TaskKind::PingOff));
        assert_eq!(q.pop_due(2).map(|d| d.kind), Some(TaskKind::StirrerStop));
        assert_eq!(q.pop_due(2), None);
        assert!(q.is_armed(TaskKind::DutyTick));
    }

    #[test]
    fn cancel_reports_whether_anything_was_pending() {
        let mut q = TimerQueue::new();
        assert!(!q.cancel(TaskKind::PingOff));
        q.arm(TaskKind::PingOff, 0, 1);
        assert!(q.cancel(TaskKind::PingOff));
        assert!(!q.is_armed(TaskKind::PingOff));
    }

    #[test]
    fn ties_fire_in_arming_order() {
        let mut q = TimerQueue::new();
        q.arm_at(TaskKind::StirrerStop, 4);
        q.arm_at(TaskKind::DutyTick, 4);
        assert_eq!(q.pop_due(4).map(|d| d.kind), Some(TaskKind::StirrerStop));
        assert_eq!(q.pop_due(4).map(|d| d.kind), Some(TaskKind::DutyTick));
    }
}
