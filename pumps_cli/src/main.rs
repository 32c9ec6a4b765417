#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions)]

mod cli;
mod error_fmt;
mod rt;
mod serve;

use std::io::IsTerminal;
use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use pumps_config::{Config, FileRatioStore, MemoryRatioStore};
use pumps_core::error::PumpsError;
use pumps_core::{Command, Reply};
use serde_json::json;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("warning: color-eyre not installed: {e}");
    }

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::debug!(error = ?err, "exiting with error");
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    match cli.cmd {
        Commands::Serve {
            exit_when_idle,
            rt,
            rt_prio,
        } => {
            let cfg = load_config(&cli.config)?;
            init_tracing(cli.json, cli.log_level.as_deref(), &cfg)?;
            serve::run_serve(&cfg, exit_when_idle, rt, rt_prio)?;
            Ok(())
        }
        Commands::Parse { line } => {
            let cfg = load_config_or_default(&cli.config)?;
            init_tracing(cli.json, cli.log_level.as_deref(), &cfg)?;
            let cmd = Command::parse_with_default(&line, cfg.calibration.default_target_ml)
                .map_err(PumpsError::from)?;
            println!("{}", command_json(&cmd));
            Ok(())
        }
        Commands::Ratios => {
            let cfg = load_config(&cli.config)?;
            init_tracing(cli.json, cli.log_level.as_deref(), &cfg)?;
            let mut store = FileRatioStore::new(&cfg.calibration.file);
            let ratios = store
                .ratios()
                .map_err(|e| PumpsError::Persist(format!("{e:#}")))?;
            println!(
                "{}",
                json!({
                    "file": store.path().display().to_string(),
                    "version": ratios.version,
                    "steps_per_ml": ratios.steps_per_ml,
                    "ticks_per_ml": ratios.ticks_per_ml,
                })
            );
            Ok(())
        }
        Commands::SelfCheck => {
            let cfg = load_config_or_default(&cli.config)?;
            init_tracing(cli.json, cli.log_level.as_deref(), &cfg)?;
            self_check(&cfg, cli.json)
        }
    }
}

/// Read, parse and validate the TOML config; failures map to `PumpsError::Config`.
fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PumpsError::Config(format!("read {}: {e}", path.display())))?;
    let cfg = pumps_config::load_toml(&text)
        .map_err(|e| PumpsError::Config(format!("parse {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| PumpsError::Config(format!("{e:#}")))?;
    Ok(cfg)
}

/// Like `load_config`, but a missing file yields the built-in defaults.
fn load_config_or_default(path: &Path) -> eyre::Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn init_tracing(json: bool, cli_level: Option<&str>, cfg: &Config) -> eyre::Result<()> {
    let level = cli_level
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("invalid log level {level:?}"))?,
    };

    // stdout carries protocol replies only
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if json {
        layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
    } else {
        let ansi = std::io::stderr().is_terminal();
        layers.push(fmt::layer().with_ansi(ansi).with_writer(std::io::stderr).boxed());
    }

    if let Some(file) = cfg.logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| PumpsError::Config(format!("logging.file {file:?} has no file name")))?;
        let appender = match cfg.logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

fn command_json(cmd: &Command) -> serde_json::Value {
    let head = json!({ "code": cmd.code(), "name": cmd.name() });
    let args = match *cmd {
        Command::DoseStepper { pump, ml } => json!({ "pump": pump, "ml": ml }),
        Command::StepperCalibration {
            pump,
            on,
            target_ml,
        } => json!({ "pump": pump, "on": on, "target_ml": target_ml }),
        Command::Ping | Command::Reset => json!({}),
        Command::DoseMotor { motor, ml } => json!({ "motor": motor, "ml": ml }),
        Command::MotorCalibration {
            motor,
            on,
            target_ml,
        } => json!({ "motor": motor, "on": on, "target_ml": target_ml }),
    };
    let mut obj = head;
    if let (Some(o), Some(a)) = (obj.as_object_mut(), args.as_object()) {
        o.extend(a.clone());
    }
    obj
}

fn self_check(cfg: &Config, json_out: bool) -> eyre::Result<()> {
    let mut doser = serve::build_doser(
        cfg,
        serve::simulated_parts(),
        Box::new(MemoryRatioStore::default()),
    )?;
    let reply = doser.execute("3")?;
    doser.shutdown();
    if reply != Some(Reply::Pong) {
        eyre::bail!("self-check: expected {:?} to ping, got {reply:?}", Reply::Pong.as_str());
    }
    let snap = doser.snapshot();
    if json_out {
        println!(
            "{}",
            json!({
                "ok": true,
                "reply": Reply::Pong.as_str(),
                "stirrer_enabled": snap.stirrer_enabled,
                "drivers_enabled": snap.drivers_enabled,
            })
        );
    } else {
        println!("self-check ok: ping -> {}", Reply::Pong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1 2 5.5", json!({"code": 1, "name": "dose_stepper", "pump": 2, "ml": 5.5}))]
    #[case("2 1 1", json!({"code": 2, "name": "stepper_calibration", "pump": 1, "on": true, "target_ml": 300}))]
    #[case("3", json!({"code": 3, "name": "ping"}))]
    #[case("6 2 0 40", json!({"code": 6, "name": "motor_calibration", "motor": 2, "on": false, "target_ml": 40}))]
    fn commands_render_flat_json(#[case] line: &str, #[case] expected: serde_json::Value) {
        let cmd = Command::parse(line).unwrap();
        assert_eq!(command_json(&cmd), expected);
    }

    #[test]
    fn missing_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(exit_code_for_error(&err), 3);
    }

    #[test]
    fn invalid_config_names_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[duty]\ntick_ms = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err}").contains("duty.tick_ms"));
    }
}
