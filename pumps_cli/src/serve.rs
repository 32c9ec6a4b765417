//! Hardware assembly and the `serve` control loop.

use std::io::{BufReader, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use pumps_config::{Config, FileRatioStore};
use pumps_core::runner::{self, RunParams, RunStats};
use pumps_core::{CommandReader, CoreCfg, DUTY_COUNT, Doser, Reply, STEPPER_COUNT};
use pumps_traits::{InputPin, OutputPin, RatioStore, Stepper};

/// Boxed actuators for one board.
pub struct Parts {
    pub steppers: [Box<dyn Stepper>; STEPPER_COUNT],
    pub enable: Box<dyn OutputPin>,
    pub duty: [Box<dyn OutputPin>; DUTY_COUNT],
    pub stirrer: Box<dyn OutputPin>,
    pub jumper: Option<Box<dyn InputPin>>,
}

/// Simulated board; the jumper is absent so `stirrer.enabled` decides.
pub fn simulated_parts() -> Parts {
    use pumps_hardware::{SimulatedPin, SimulatedStepper};

    let pin = |name| Box::new(SimulatedPin::new(name)) as Box<dyn OutputPin>;
    Parts {
        steppers: std::array::from_fn(|_| Box::new(SimulatedStepper::new()) as Box<dyn Stepper>),
        enable: pin("enable"),
        duty: [pin("duty1"), pin("duty2")],
        stirrer: pin("stirrer"),
        jumper: None,
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn board_parts(cfg: &Config) -> eyre::Result<Parts> {
    use pumps_hardware::gpio::{GpioInput, GpioOutput, GpioStepper};

    let p = &cfg.pins;
    let out = |pin: u8, inverted: bool| -> eyre::Result<Box<dyn OutputPin>> {
        let o = GpioOutput::new(pin, inverted).wrap_err_with(|| format!("open output pin {pin}"))?;
        Ok(Box::new(o))
    };
    let mut steppers: Vec<Box<dyn Stepper>> = Vec::with_capacity(p.steppers.len());
    for s in &p.steppers {
        let st = GpioStepper::new(s.step, s.dir)
            .wrap_err_with(|| format!("open stepper pins step={} dir={}", s.step, s.dir))?;
        steppers.push(Box::new(st));
    }
    let steppers: [Box<dyn Stepper>; STEPPER_COUNT] = steppers
        .try_into()
        .map_err(|_| eyre::eyre!("expected {STEPPER_COUNT} steppers"))?;
    let jumper = match p.stirrer_jumper {
        Some(pin) => {
            let j = GpioInput::new(pin).wrap_err_with(|| format!("open jumper pin {pin}"))?;
            Some(Box::new(j) as Box<dyn InputPin>)
        }
        None => None,
    };
    Ok(Parts {
        steppers,
        enable: out(p.enable, cfg.stepper.enable_active_low)?,
        duty: [out(p.duty_motors[0], false)?, out(p.duty_motors[1], false)?],
        stirrer: out(p.stirrer, false)?,
        jumper,
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn board_parts(_cfg: &Config) -> eyre::Result<Parts> {
    tracing::info!("hardware feature disabled; using simulated actuators");
    Ok(simulated_parts())
}

/// Assemble the engine from `parts`, sampling the jumper once.
pub fn build_doser(cfg: &Config, parts: Parts, store: Box<dyn RatioStore>) -> eyre::Result<Doser> {
    let Parts {
        steppers,
        enable,
        duty,
        stirrer,
        jumper,
    } = parts;
    let mut builder = Doser::builder()
        .with_steppers(steppers)
        .with_enable_pin(enable)
        .with_duty_pins(duty)
        .with_stirrer_pin(stirrer)
        .with_ratio_store(store)
        .with_config(CoreCfg::from(cfg));
    if let Some(j) = &jumper {
        builder = builder.sample_stirrer_jumper(j);
    }
    builder.build()
}

pub fn run_serve(
    cfg: &Config,
    exit_when_idle: bool,
    rt: bool,
    rt_prio: Option<i32>,
) -> eyre::Result<RunStats> {
    if rt {
        crate::rt::setup_rt_once(rt_prio);
    }

    let store = FileRatioStore::new(&cfg.calibration.file);
    let mut doser = build_doser(cfg, board_parts(cfg)?, Box::new(store))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .wrap_err("install Ctrl-C handler")?;
    }

    let reader = CommandReader::spawn(BufReader::new(std::io::stdin()));
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    // Hosts detect the controller by the ping reply it prints on boot.
    doser.ping();
    writeln!(out, "{}", Reply::Pong).wrap_err("write boot banner")?;
    out.flush().wrap_err("flush boot banner")?;
    tracing::info!(
        stirrer = %doser.stirrer_state(),
        tick_ms = doser.cfg().tick_ms,
        exit_when_idle,
        "controller ready"
    );
    runner::run(
        &mut doser,
        &reader,
        &shutdown,
        &mut out,
        RunParams {
            idle_sleep_us: cfg.runner.idle_sleep_us,
            exit_when_idle,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumps_config::MemoryRatioStore;

    #[test]
    fn simulated_board_builds_and_answers_ping() {
        let cfg = Config::default();
        let mut d = build_doser(
            &cfg,
            simulated_parts(),
            Box::new(MemoryRatioStore::new(100, 10)),
        )
        .unwrap();
        let reply = d.execute("3").unwrap();
        assert_eq!(reply.map(|r| r.as_str()), Some("PumpsX4"));
        d.shutdown();
    }

    #[test]
    fn closed_jumper_overrides_config() {
        let mut cfg = Config::default();
        cfg.stirrer.enabled = false;
        let mut parts = simulated_parts();
        parts.jumper = Some(Box::new(pumps_hardware::SimulatedInput(true)));
        let d = build_doser(&cfg, parts, Box::new(MemoryRatioStore::default())).unwrap();
        assert!(d.snapshot().stirrer_enabled);
    }
}
