pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type carried across the hardware seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A binary output line (driver enable, duty motor, stirrer).
pub trait OutputPin {
    fn set_high(&mut self) -> Result<(), BoxError>;
    fn set_low(&mut self) -> Result<(), BoxError>;

    fn set_level(&mut self, high: bool) -> Result<(), BoxError> {
        if high { self.set_high() } else { self.set_low() }
    }
}

/// A binary input line, sampled on demand.
pub trait InputPin {
    fn is_high(&self) -> Result<bool, BoxError>;
}

/// Step-pulse generator for a single stepper.
///
/// Positions and distances are in steps. Implementations own the
/// acceleration/velocity profile; callers only queue distance and poll.
pub trait Stepper {
    /// Set the target to `current_position() + delta`.
    fn move_relative(&mut self, delta: i64);
    /// Signed steps remaining to the target.
    fn distance_to_go(&self) -> i64;
    fn current_position(&self) -> i64;
    /// Redefine the current position; the target collapses onto it and
    /// motion stops.
    fn set_current_position(&mut self, position: i64);
    fn set_max_speed(&mut self, steps_per_sec: f32);
    fn set_acceleration(&mut self, steps_per_sec2: f32);
    /// Constant speed used by `run_speed()`.
    fn set_speed(&mut self, steps_per_sec: f32);
    /// Step toward the target along the accelerated profile if a step is
    /// due. Returns true while the target has not been reached.
    fn run(&mut self) -> bool;
    /// Step at the constant speed if a step is due. Returns true when a step
    /// was taken.
    fn run_speed(&mut self) -> bool;
    /// Abandon constant-speed motion.
    fn stop(&mut self);
}

/// Persistent storage for the two calibration ratios.
///
/// A ratio that was never written reads as 0.
pub trait RatioStore {
    fn steps_per_ml(&mut self) -> Result<u32, BoxError>;
    fn set_steps_per_ml(&mut self, value: u32) -> Result<(), BoxError>;
    fn ticks_per_ml(&mut self) -> Result<u32, BoxError>;
    fn set_ticks_per_ml(&mut self, value: u32) -> Result<(), BoxError>;
}

impl<T: OutputPin + ?Sized> OutputPin for Box<T> {
    fn set_high(&mut self) -> Result<(), BoxError> {
        (**self).set_high()
    }
    fn set_low(&mut self) -> Result<(), BoxError> {
        (**self).set_low()
    }
}

impl<T: InputPin + ?Sized> InputPin for Box<T> {
    fn is_high(&self) -> Result<bool, BoxError> {
        (**self).is_high()
    }
}

impl<T: Stepper + ?Sized> Stepper for Box<T> {
    fn move_relative(&mut self, delta: i64) {
        (**self).move_relative(delta);
    }
    fn distance_to_go(&self) -> i64 {
        (**self).distance_to_go()
    }
    fn current_position(&self) -> i64 {
        (**self).current_position()
    }
    fn set_current_position(&mut self, position: i64) {
        (**self).set_current_position(position);
    }
    fn set_max_speed(&mut self, steps_per_sec: f32) {
        (**self).set_max_speed(steps_per_sec);
    }
    fn set_acceleration(&mut self, steps_per_sec2: f32) {
        (**self).set_acceleration(steps_per_sec2);
    }
    fn set_speed(&mut self, steps_per_sec: f32) {
        (**self).set_speed(steps_per_sec);
    }
    fn run(&mut self) -> bool {
        (**self).run()
    }
    fn run_speed(&mut self) -> bool {
        (**self).run_speed()
    }
    fn stop(&mut self) {
        (**self).stop();
    }
}

impl<T: RatioStore + ?Sized> RatioStore for Box<T> {
    fn steps_per_ml(&mut self) -> Result<u32, BoxError> {
        (**self).steps_per_ml()
    }
    fn set_steps_per_ml(&mut self, value: u32) -> Result<(), BoxError> {
        (**self).set_steps_per_ml(value)
    }
    fn ticks_per_ml(&mut self) -> Result<u32, BoxError> {
        (**self).ticks_per_ml()
    }
    fn set_ticks_per_ml(&mut self, value: u32) -> Result<(), BoxError> {
        (**self).set_ticks_per_ml(value)
    }
}
