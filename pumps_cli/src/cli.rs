//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pumps", version, about = "Four-stepper, two-motor dosing controller")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/pumps.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller, reading protocol lines on stdin and replying on stdout
    Serve {
        /// Exit once stdin is closed and every pump has finished
        #[arg(long, action = ArgAction::SetTrue)]
        exit_when_idle: bool,
        /// Enable real-time mode (SCHED_FIFO, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority and calls mlockall(MCL_CURRENT|MCL_FUTURE). Step pulses are timed by the control loop, so this reduces jitter in pump speed. May require CAP_SYS_NICE, CAP_IPC_LOCK or root. Failures are logged and the controller keeps running."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO (1..=max)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
    },
    /// Parse one protocol line and print it as JSON
    Parse {
        /// The command line, e.g. "1 2 5.5"
        line: String,
    },
    /// Print the persisted calibration ratios as JSON
    Ratios,
    /// Build the controller on simulated hardware and check a ping round-trip
    SelfCheck,
}
