//! Real-time scheduling helpers (Linux SCHED_FIFO and mlockall).

#[cfg(target_os = "linux")]
pub fn setup_rt_once(prio: Option<i32>) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    fn is_retryable_memlock_error(err: &std::io::Error) -> bool {
        matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
    }

    // Lock current and future pages; fall back to current pages only.
    fn try_apply_mem_lock() -> eyre::Result<&'static str> {
        use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

        let rc = unsafe { mlockall(MCL_CURRENT | MCL_FUTURE) };
        if rc == 0 {
            return Ok("current|future");
        }
        let err = std::io::Error::last_os_error();
        if is_retryable_memlock_error(&err) && unsafe { mlockall(MCL_CURRENT) } == 0 {
            return Ok("current");
        }
        let mut msg = format!("mlockall failed: {err}");
        if is_retryable_memlock_error(&err) {
            msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
        }
        Err(eyre::eyre!(msg))
    }

    // SCHED_FIFO priority, clamped to the system range.
    fn try_apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

        let (min, max) = unsafe {
            let min = sched_get_priority_min(SCHED_FIFO);
            let max = sched_get_priority_max(SCHED_FIFO);
            if min < 0 || max < 0 { (1, 99) } else { (min, max) }
        };
        let prio_val = prio.unwrap_or(max).clamp(min, max);
        let param = sched_param {
            sched_priority: prio_val,
        };
        let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EPERM) {
                eyre::bail!("{err}; hint: run as root or grant CAP_SYS_NICE to the pumps binary");
            }
            return Err(eyre::eyre!(err));
        }
        Ok(prio_val)
    }

    RT_ONCE.get_or_init(|| {
        match try_apply_mem_lock() {
            Ok(mode) => tracing::info!(mode, "rt: memory locked"),
            Err(err) => tracing::warn!(error = %err, "rt: memory lock not applied"),
        }
        match try_apply_fifo_priority(prio) {
            Ok(p) => tracing::info!(prio = p, "rt: SCHED_FIFO applied"),
            Err(err) => tracing::warn!(error = %err, ?prio, "rt: SCHED_FIFO not applied"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(prio: Option<i32>) {
    tracing::warn!(?prio, "rt: real-time mode is only supported on Linux; ignoring --rt");
}
