//! Raspberry Pi GPIO backends (rppal).

use std::time::{Duration, Instant};

use pumps_traits::{BoxError, Stepper};
use rppal::gpio::Gpio;
use tracing::{debug, trace};

use crate::error::{HwError, Result};

fn open(pin: u8) -> Result<rppal::gpio::Pin> {
    let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
    gpio.get(pin).map_err(|e| match e {
        rppal::gpio::Error::PinUsed(p) | rppal::gpio::Error::PinNotAvailable(p) => {
            HwError::PinInUse(p)
        }
        other => HwError::Gpio(other.to_string()),
    })
}

/// Output line; `inverted` swaps the electrical level.
pub struct GpioOutput {
    pin: rppal::gpio::OutputPin,
    inverted: bool,
}

impl GpioOutput {
    pub fn new(pin: u8, inverted: bool) -> Result<Self> {
        let mut out = open(pin)?.into_output();
        if inverted {
            out.set_high();
        } else {
            out.set_low();
        }
        debug!(pin, inverted, "gpio output ready");
        Ok(Self { pin: out, inverted })
    }
}

impl pumps_traits::OutputPin for GpioOutput {
    fn set_high(&mut self) -> std::result::Result<(), BoxError> {
        if self.inverted {
            self.pin.set_low();
        } else {
            self.pin.set_high();
        }
        Ok(())
    }

    fn set_low(&mut self) -> std::result::Result<(), BoxError> {
        if self.inverted {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

/// Input with the internal pull-up enabled; an open jumper reads high.
pub struct GpioInput {
    pin: rppal::gpio::InputPin,
}

impl GpioInput {
    pub fn new(pin: u8) -> Result<Self> {
        Ok(Self {
            pin: open(pin)?.into_input_pullup(),
        })
    }
}

impl pumps_traits::InputPin for GpioInput {
    fn is_high(&self) -> std::result::Result<bool, BoxError> {
        Ok(self.pin.is_high())
    }
}

/// Step/direction driver with a trapezoidal speed profile.
///
/// Steps are emitted from `run()`/`run_speed()` only when the step interval
/// for the current speed has elapsed, so callers poll it as often as they can.
pub struct GpioStepper {
    step: rppal::gpio::OutputPin,
    dir: rppal::gpio::OutputPin,
    position: i64,
    target: i64,
    speed: f32,
    cruise: f32,
    max_speed: f32,
    acceleration: f32,
    last_step: Option<Instant>,
}

impl GpioStepper {
    pub fn new(step_pin: u8, dir_pin: u8) -> Result<Self> {
        let mut step = open(step_pin)?.into_output();
        let dir = open(dir_pin)?.into_output();
        step.set_low();
        Ok(Self {
            step,
            dir,
            position: 0,
            target: 0,
            speed: 0.0,
            cruise: 0.0,
            max_speed: 1.0,
            acceleration: 1.0,
            last_step: None,
        })
    }

    fn step_due(&self, speed: f32) -> bool {
        if speed == 0.0 {
            return false;
        }
        let interval = Duration::from_secs_f32(1.0 / speed.abs());
        self.last_step.is_none_or(|t| t.elapsed() >= interval)
    }

    fn pulse(&mut self, forward: bool) {
        if forward {
            self.dir.set_high();
        } else {
            self.dir.set_low();
        }
        self.step.set_high();
        std::hint::spin_loop();
        self.step.set_low();
        self.last_step = Some(Instant::now());
        trace!(position = self.position, "step");
    }

    /// Next profile speed after one step, given the remaining distance.
    fn next_speed(&self, remaining: i64) -> f32 {
        let v = self.speed.abs().max(1.0);
        let a = self.acceleration.max(1.0);
        let stopping = (v * v) / (2.0 * a);
        if (remaining.unsigned_abs() as f32) <= stopping {
            (v * v - 2.0 * a).max(1.0).sqrt()
        } else {
            (v * v + 2.0 * a).sqrt().min(self.max_speed)
        }
    }
}

impl Stepper for GpioStepper {
    fn move_relative(&mut self, delta: i64) {
        self.target = self.position.saturating_add(delta);
    }

    fn distance_to_go(&self) -> i64 {
        self.target - self.position
    }

    fn current_position(&self) -> i64 {
        self.position
    }

    fn set_current_position(&mut self, position: i64) {
        self.position = position;
        self.target = position;
        self.speed = 0.0;
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) {
        self.max_speed = steps_per_sec.abs().max(1.0);
    }

    fn set_acceleration(&mut self, steps_per_sec2: f32) {
        self.acceleration = steps_per_sec2.abs().max(1.0);
    }

    fn set_speed(&mut self, steps_per_sec: f32) {
        self.cruise = steps_per_sec.clamp(-self.max_speed, self.max_speed);
    }

    fn run(&mut self) -> bool {
        let dist = self.distance_to_go();
        if dist == 0 {
            self.speed = 0.0;
            return false;
        }
        let speed = if self.speed == 0.0 {
            self.acceleration.sqrt().min(self.max_speed)
        } else {
            self.speed
        };
        if self.step_due(speed) {
            let forward = dist > 0;
            self.pulse(forward);
            self.position += if forward { 1 } else { -1 };
            self.speed = self.next_speed(self.distance_to_go());
        }
        self.distance_to_go() != 0
    }

    fn run_speed(&mut self) -> bool {
        if !self.step_due(self.cruise) {
            return false;
        }
        let forward = self.cruise > 0.0;
        self.pulse(forward);
        let d = if forward { 1 } else { -1 };
        self.position += d;
        self.target += d;
        true
    }

    fn stop(&mut self) {
        self.cruise = 0.0;
        self.speed = 0.0;
    }
}
