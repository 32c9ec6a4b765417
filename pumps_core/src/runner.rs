//! Control loop: one engine pass, then at most one command, forever.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use pumps_traits::{OutputPin, RatioStore, Stepper};

use crate::engine::DoserCore;
use crate::error::Result;
use crate::intake::CommandReader;

#[derive(Debug, Clone, Copy)]
pub struct RunParams {
    /// Sleep after a pass that did no work (0 = spin).
    pub idle_sleep_us: u64,
    /// Return once the command source is exhausted and the engine is idle.
    pub exit_when_idle: bool,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            idle_sleep_us: 200,
            exit_when_idle: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub passes: u64,
    pub commands: u64,
    pub rejected: u64,
}

/// Run until `shutdown` is raised (or, with `exit_when_idle`, until there is
/// nothing left to do). Replies are written to `out`, one per line.
/// Every output is driven low before returning, also on error.
pub fn run<S, P, R, W>(
    doser: &mut DoserCore<S, P, R>,
    reader: &CommandReader,
    shutdown: &AtomicBool,
    out: &mut W,
    params: RunParams,
) -> Result<RunStats>
where
    S: Stepper,
    P: OutputPin,
    R: RatioStore,
    W: Write,
{
    let mut stats = RunStats::default();
    let result = run_loop(doser, reader, shutdown, out, params, &mut stats);
    doser.shutdown();
    tracing::info!(
        passes = stats.passes,
        commands = stats.commands,
        rejected = stats.rejected,
        "control loop stopped"
    );
    result.map(|()| stats)
}

fn run_loop<S, P, R, W>(
    doser: &mut DoserCore<S, P, R>,
    reader: &CommandReader,
    shutdown: &AtomicBool,
    out: &mut W,
    params: RunParams,
    stats: &mut RunStats,
) -> Result<()>
where
    S: Stepper,
    P: OutputPin,
    R: RatioStore,
    W: Write,
{
    let idle_sleep = Duration::from_micros(params.idle_sleep_us);
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            return Ok(());
        }

        let report = doser.pass();
        stats.passes += 1;

        let line = reader.poll();
        if let Some(line) = &line {
            stats.commands += 1;
            match doser.execute(line) {
                Ok(Some(reply)) => {
                    writeln!(out, "{reply}").wrap_err("write reply")?;
                    out.flush().wrap_err("flush reply")?;
                }
                Ok(None) => {}
                Err(_) => stats.rejected += 1,
            }
        }

        if params.exit_when_idle && reader.is_closed() && doser.is_idle() {
            tracing::info!("input exhausted and engine idle");
            return Ok(());
        }

        if line.is_none() && !report.did_work() && !idle_sleep.is_zero() {
            doser.clock().sleep(idle_sleep);
        }
    }
}
