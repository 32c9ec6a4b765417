//! Human-readable error descriptions and structured JSON error formatting.

use pumps_core::error::{BuildError, ParseError, PumpsError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSteppers => {
                "What happened: No stepper drivers were provided to the controller.\nLikely causes: Stepper pins failed to initialize or were not wired into the builder.\nHow to fix: Check [pins.steppers] and pass all four drivers via with_steppers(...).".to_string()
            }
            BuildError::MissingEnablePin => {
                "What happened: The shared stepper enable line is missing.\nLikely causes: pins.enable failed to initialize.\nHow to fix: Check pins.enable in the config and GPIO permissions.".to_string()
            }
            BuildError::MissingDutyPins => {
                "What happened: The duty motor outputs are missing.\nLikely causes: pins.duty_motors failed to initialize.\nHow to fix: Check pins.duty_motors in the config and GPIO permissions.".to_string()
            }
            BuildError::MissingStirrerPin => {
                "What happened: The stirrer output is missing.\nLikely causes: pins.stirrer failed to initialize.\nHow to fix: Check pins.stirrer in the config and GPIO permissions.".to_string()
            }
            BuildError::MissingRatioStore => {
                "What happened: No calibration ratio store was provided.\nLikely causes: The builder was not given with_ratio_store(...).\nHow to fix: Set [calibration].file to a writable path.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PumpsError>() {
        return match pe {
            PumpsError::Config(msg) => format!(
                "What happened: The configuration could not be used ({msg}).\nLikely causes: A typo in the TOML, a duplicated pin or an out-of-range value.\nHow to fix: Edit the config file (see --config), then rerun."
            ),
            PumpsError::Parse(ParseError::UnknownFunction(code)) => format!(
                "What happened: Function code {code} is not part of the protocol.\nLikely causes: A typo or a newer client.\nHow to fix: Use codes 1 (dose), 2 (calibrate), 3 (ping), 4 (reset), 5 (motor dose) or 6 (motor calibrate)."
            ),
            PumpsError::Parse(parse) => format!(
                "What happened: The command line was rejected ({parse}).\nLikely causes: Missing or malformed arguments.\nHow to fix: Send `<code> <id> <value>` separated by spaces, e.g. `1 2 5.5`."
            ),
            PumpsError::Persist(msg) => format!(
                "What happened: Calibration ratios could not be read or written ({msg}).\nLikely causes: The ratio file is not writable or its directory is missing.\nHow to fix: Check [calibration].file and its permissions."
            ),
            PumpsError::Hardware(msg) | PumpsError::HardwareFault(msg) => format!(
                "What happened: An actuator reported an error ({msg}).\nLikely causes: Wrong pin numbers, wiring or insufficient GPIO permissions.\nHow to fix: Check [pins] in the config and the driver power supply."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from hardware init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("already in use") || lower.contains("gpio error") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers, another process holding the line, or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable process exit codes per error family; anything untyped returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    match err.downcast_ref::<PumpsError>() {
        Some(PumpsError::Config(_)) => 3,
        Some(PumpsError::Parse(_)) => 4,
        Some(PumpsError::Hardware(_) | PumpsError::HardwareFault(_)) => 5,
        Some(PumpsError::Persist(_)) => 6,
        _ => 1,
    }
}

/// Stable name of the error family for JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<PumpsError>() {
        Some(PumpsError::Config(_)) => "Config",
        Some(PumpsError::Parse(_)) => "Parse",
        Some(PumpsError::Hardware(_) | PumpsError::HardwareFault(_)) => "Hardware",
        Some(PumpsError::Persist(_)) => "Persist",
        Some(_) => "Rejected",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(PumpsError::Parse(parse)) = err.downcast_ref::<PumpsError>() {
        obj["details"] = json!({ "parse": parse.to_string() });
    }
    obj.to_string()
}
