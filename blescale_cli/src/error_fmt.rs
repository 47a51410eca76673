//! Human-readable error descriptions and structured JSON error formatting.

use blescale_config::ConfigError;
use blescale_core::error::{BuildError, NodeError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLoadCell => {
                "What happened: No load cell was provided to the node.\nLikely causes: The HX711 driver failed to initialize or was not wired into the builder.\nHow to fix: Check [pins] in the board profile and the GPIO permissions.".to_string()
            }
            BuildError::MissingRadio => {
                "What happened: No radio was provided to the node.\nLikely causes: The radio stack failed to start.\nHow to fix: Re-run with --log-level=debug to see why the radio is missing.".to_string()
            }
            BuildError::MissingStorage => {
                "What happened: No configuration storage was provided to the node.\nLikely causes: The storage backend could not be created.\nHow to fix: Check [storage].config_path in the board profile.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid estimator configuration ({msg}).\nLikely causes: Out-of-range sampling parameters.\nHow to fix: Use at least one sample and one attempt."
            ),
        };
    }

    if let Some(ne) = err.downcast_ref::<NodeError>() {
        return match ne {
            NodeError::Timeout => "What happened: Load cell read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DOUT/SCK pins and power, and consider increasing hardware.sensor_read_timeout_ms in the board profile.".to_string(),
            NodeError::Radio(msg) => format!(
                "What happened: The radio rejected a request ({msg}).\nLikely causes: Radio stack not running or payload refused.\nHow to fix: Restart the node; re-run with --log-level=debug for details."
            ),
            NodeError::PersistFailure(msg) => format!(
                "What happened: The configuration could not be saved ({msg}).\nLikely causes: Missing directory, read-only medium or full disk.\nHow to fix: Check [storage].config_path and its permissions."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(ConfigError::Persist(msg)) = err.downcast_ref::<ConfigError>() {
        return format!(
            "What happened: The configuration could not be saved ({msg}).\nLikely causes: Missing directory, read-only medium or full disk.\nHow to fix: Check [storage].config_path and its permissions."
        );
    }

    if err.downcast_ref::<toml::de::Error>().is_some() {
        return format!(
            "What happened: The board profile is not valid TOML.\nLikely causes: Typo or wrong value type ({err:#}).\nHow to fix: Edit the file given with --board and try again."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if (lower.contains("hx711") && lower.contains("timeout")) || lower.contains("datareadytimeout")
    {
        return "What happened: HX711 did not produce data within the configured timeout.\nLikely causes: Wrong DOUT/SCK pins, wiring/power issues, or timeout configured too low.\nHow to fix: Check [pins] in the board profile, verify power, and raise hardware.sensor_read_timeout_ms.".to_string();
    }

    if lower.contains("open hx711") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the board profile; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("invalid board profile") {
        return format!(
            "What happened: The board profile is invalid ({msg}).\nLikely causes: Equal pins, a zero timeout or an unknown rotation.\nHow to fix: Edit the file given with --board and try again."
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

/// Stable exit codes: hardware and radio faults get their own, everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<NodeError>() {
        Some(NodeError::Timeout) => 3,
        Some(NodeError::Hardware(_)) => 4,
        Some(NodeError::Radio(_)) => 5,
        Some(NodeError::PersistFailure(_)) => 6,
        _ if matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::Persist(_))) => 6,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<NodeError>() {
        Some(NodeError::Timeout) => "Timeout",
        Some(NodeError::Hardware(_)) => "Hardware",
        Some(NodeError::Radio(_)) => "Radio",
        Some(NodeError::PersistFailure(_)) => "Persist",
        Some(NodeError::NoStableReading { .. }) => "NoStableReading",
        Some(NodeError::InvalidValue { .. }) => "InvalidValue",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
