//! Human-readable error descriptions and structured JSON error formatting.

use hand_core::error::{BuildError, FingerFault, HandError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingInput => {
                "What happened: No analog input was provided to the hand.\nLikely causes: The ADC backend failed to initialize or was not wired into the builder.\nHow to fix: Check the [hardware] SPI settings, or run the simulated backend.".to_string()
            }
            BuildError::MissingLines => {
                "What happened: No direction lines were provided to the hand.\nLikely causes: GPIO setup failed before the builder ran.\nHow to fix: Check the line numbers in [[fingers]] and GPIO permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML or an overridden finger table.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(he) = err.downcast_ref::<HandError>() {
        return match he {
            HandError::Fault { finger, fault } => match fault {
                FingerFault::SensorFault => format!(
                    "What happened: The {finger} position sensor reads as disconnected.\nLikely causes: Unplugged potentiometer, broken wiper, or wrong adc_channel.\nHow to fix: Check the sensor cable and the [[fingers]] adc_channel value."
                ),
                FingerFault::SpeedFault => format!(
                    "What happened: The {finger} sensor reports an impossible speed.\nLikely causes: Electrical noise or a loose sensor connection.\nHow to fix: Check grounding and connectors; raise estimator.implausible_from_mm_s only if the actuator is faster than configured."
                ),
                FingerFault::StallFault => format!(
                    "What happened: The {finger} actuator stalled.\nLikely causes: Mechanical obstruction or a worn gearbox.\nHow to fix: Clear the obstruction, then send a different instruction."
                ),
                FingerFault::PositionFault => format!(
                    "What happened: The {finger} finger stopped at an unexpected position.\nLikely causes: External load or an outdated sensor calibration.\nHow to fix: Re-run the sensor calibration (--calibration)."
                ),
            },
            HandError::HardwareFault(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: Both direction lines of a driver were high.\nHow to fix: Power down the actuators and inspect the driver wiring."
            ),
            HandError::Hardware(msg) => format!(
                "What happened: Hardware access failed ({msg}).\nLikely causes: Missing GPIO/SPI permissions or wrong pin numbers.\nHow to fix: Run with sufficient privileges and verify the [[fingers]] and [hardware] settings."
            ),
            HandError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range instruction or pose table values.\nHow to fix: Instructions are four numbers in [0,1], e.g. 0.5,0.5,0.5,0.5."
            ),
            HandError::State(msg) => format!(
                "What happened: Internal state error ({msg}).\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'mv,mm'.".to_string();
    }

    if lower.contains("read config") || lower.contains("parse config") {
        return format!(
            "What happened: The config file could not be loaded.\nLikely causes: Wrong --config path or TOML syntax error.\nHow to fix: Check the file. Original: {msg}"
        );
    }

    if lower.contains("must be") || lower.contains("calibration") {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML or calibration data.\nHow to fix: Edit the named key and rerun."
        );
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

/// Stable exit codes; 2 is left to clap usage errors.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    match err.downcast_ref::<HandError>() {
        Some(HandError::Config(_)) => 3,
        Some(HandError::Hardware(_)) => 4,
        Some(HandError::HardwareFault(_)) => 5,
        Some(HandError::Fault { .. }) => 6,
        Some(HandError::State(_)) | None => 1,
    }
}

/// Stable machine name for the error class.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<HandError>() {
        Some(HandError::Config(_)) => "InvalidConfig",
        Some(HandError::Hardware(_)) => "Hardware",
        Some(HandError::HardwareFault(_)) => "HardwareFault",
        Some(HandError::Fault { fault, .. }) => match fault {
            FingerFault::SensorFault => "SensorFault",
            FingerFault::PositionFault => "PositionFault",
            FingerFault::SpeedFault => "SpeedFault",
            FingerFault::StallFault => "StallFault",
        },
        Some(HandError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(HandError::Fault { finger, .. }) = err.downcast_ref::<HandError>() {
        obj["details"] = json!({ "finger": finger.name() });
    }
    obj.to_string()
}
