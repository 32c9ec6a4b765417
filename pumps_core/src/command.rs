//! Line protocol.
//!
//! A command is one line of whitespace-separated tokens; the first token is
//! the function code:
//!
//! | code | arguments                         | action                     |
//! |------|-----------------------------------|----------------------------|
//! | 1    | `<pump 1-4> <ml>`                 | dose a stepper pump        |
//! | 2    | `<pump 1-4> <0\|1> [target ml]`   | stepper calibration off/on |
//! | 3    |                                   | ping                       |
//! | 4    |                                   | zero stepper positions     |
//! | 5    | `<motor 1-2> <ml>`                | dose a duty motor          |
//! | 6    | `<motor 1-2> <0\|1> [target ml]`  | motor calibration off/on   |
//!
//! Parsing only checks syntax. Ranges (ids, volumes, targets) are checked
//! by the engine so a rejected command never touches actuator state.
//! Tokens past the last argument are ignored.

use core::fmt;
use std::str::SplitWhitespace;

use crate::error::ParseError;

/// Calibration target used when the command omits it.
pub const DEFAULT_TARGET_ML: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    DoseStepper { pump: i64, ml: f32 },
    StepperCalibration { pump: i64, on: bool, target_ml: i64 },
    Ping,
    Reset,
    DoseMotor { motor: i64, ml: f32 },
    MotorCalibration { motor: i64, on: bool, target_ml: i64 },
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        Self::parse_with_default(line, DEFAULT_TARGET_ML)
    }

    pub fn parse_with_default(line: &str, default_target_ml: u32) -> Result<Self, ParseError> {
        let mut tokens = Tokens(line.split_whitespace());
        let code = tokens
            .0
            .next()
            .ok_or(ParseError::Empty)
            .and_then(|t| int("function", t))?;

        match code {
            1 => Ok(Self::DoseStepper {
                pump: tokens.int("pump")?,
                ml: tokens.float("ml")?,
            }),
            2 => Ok(Self::StepperCalibration {
                pump: tokens.int("pump")?,
                on: tokens.switch()?,
                target_ml: tokens.target(default_target_ml)?,
            }),
            3 => Ok(Self::Ping),
            4 => Ok(Self::Reset),
            5 => Ok(Self::DoseMotor {
                motor: tokens.int("motor")?,
                ml: tokens.float("ml")?,
            }),
            6 => Ok(Self::MotorCalibration {
                motor: tokens.int("motor")?,
                on: tokens.switch()?,
                target_ml: tokens.target(default_target_ml)?,
            }),
            other => Err(ParseError::UnknownFunction(other)),
        }
    }

    /// Protocol function code.
    pub fn code(&self) -> u8 {
        match self {
            Self::DoseStepper { .. } => 1,
            Self::StepperCalibration { .. } => 2,
            Self::Ping => 3,
            Self::Reset => 4,
            Self::DoseMotor { .. } => 5,
            Self::MotorCalibration { .. } => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DoseStepper { .. } => "dose_stepper",
            Self::StepperCalibration { .. } => "stepper_calibration",
            Self::Ping => "ping",
            Self::Reset => "reset",
            Self::DoseMotor { .. } => "dose_motor",
            Self::MotorCalibration { .. } => "motor_calibration",
        }
    }
}

struct Tokens<'a>(SplitWhitespace<'a>);

impl Tokens<'_> {
    fn next(&mut self, field: &'static str) -> Result<&str, ParseError> {
        self.0.next().ok_or(ParseError::MissingField(field))
    }

    fn int(&mut self, field: &'static str) -> Result<i64, ParseError> {
        let t = self.next(field)?;
        int(field, t)
    }

    fn float(&mut self, field: &'static str) -> Result<f32, ParseError> {
        let t = self.next(field)?;
        match t.parse::<f32>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(ParseError::BadFloat {
                field,
                token: t.to_owned(),
            }),
        }
    }

    fn switch(&mut self) -> Result<bool, ParseError> {
        match self.next("switch")? {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(ParseError::BadSwitch(other.to_owned())),
        }
    }

    fn target(&mut self, default_ml: u32) -> Result<i64, ParseError> {
        match self.0.next() {
            Some(t) => int("target_ml", t),
            None => Ok(i64::from(default_ml)),
        }
    }
}

fn int(field: &'static str, token: &str) -> Result<i64, ParseError> {
    token.parse::<i64>().map_err(|_| ParseError::BadInteger {
        field,
        token: token.to_owned(),
    })
}

/// Protocol-visible answer to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// A dose was queued.
    Dosed,
    /// Identification answer to a ping.
    Pong,
    /// Stepper positions were zeroed.
    Reset,
}

impl Reply {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dosed => "---",
            Self::Pong => "PumpsX4",
            Self::Reset => "Stopped all pumps.",
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1 2 5.0", Command::DoseStepper { pump: 2, ml: 5.0 })]
    #[case("1 4 -1.5", Command::DoseStepper { pump: 4, ml: -1.5 })]
    #[case("1 9 1", Command::DoseStepper { pump: 9, ml: 1.0 })]
    #[case("2 1 1", Command::StepperCalibration { pump: 1, on: true, target_ml: 300 })]
    #[case("2 1 1 100", Command::StepperCalibration { pump: 1, on: true, target_ml: 100 })]
    #[case("2 3 0", Command::StepperCalibration { pump: 3, on: false, target_ml: 300 })]
    #[case("3", Command::Ping)]
    #[case("  4 \r\n", Command::Reset)]
    #[case("5 2 0.25", Command::DoseMotor { motor: 2, ml: 0.25 })]
    #[case("6 1 1 50", Command::MotorCalibration { motor: 1, on: true, target_ml: 50 })]
    #[case("3 extra tokens", Command::Ping)]
    fn parses(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(line).unwrap(), expected);
    }

    #[rstest]
    #[case("", ParseError::Empty)]
    #[case("   ", ParseError::Empty)]
    #[case("7", ParseError::UnknownFunction(7))]
    #[case("0", ParseError::UnknownFunction(0))]
    #[case("x", ParseError::BadInteger { field: "function", token: "x".into() })]
    #[case("1", ParseError::MissingField("pump"))]
    #[case("1 2", ParseError::MissingField("ml"))]
    #[case("1 two 3", ParseError::BadInteger { field: "pump", token: "two".into() })]
    #[case("1 2 lots", ParseError::BadFloat { field: "ml", token: "lots".into() })]
    #[case("5 1 inf", ParseError::BadFloat { field: "ml", token: "inf".into() })]
    #[case("2 1", ParseError::MissingField("switch"))]
    #[case("2 1 2", ParseError::BadSwitch("2".into()))]
    #[case("6 1 1 1.5", ParseError::BadInteger { field: "target_ml", token: "1.5".into() })]
    fn rejects(#[case] line: &str, #[case] expected: ParseError) {
        assert_eq!(Command::parse(line).unwrap_err(), expected);
    }

    #[test]
    fn configured_default_target() {
        let cmd = Command::parse_with_default("6 2 1", 120).unwrap();
        assert_eq!(
            cmd,
            Command::MotorCalibration {
                motor: 2,
                on: true,
                target_ml: 120
            }
        );
    }

    #[test]
    fn replies_match_protocol() {
        assert_eq!(Reply::Dosed.to_string(), "---");
        assert_eq!(Reply::Pong.to_string(), "PumpsX4");
        assert_eq!(Reply::Reset.to_string(), "Stopped all pumps.");
    }
}
