//! Firmware key conventions.
//!
//! Parameter names follow `<Name>_<SUFFIX>`: `_STATE` is read-only
//! telemetry, `_SETPOINT` and `_SETUP` are writable parameters, `_MODE` is
//! a writable boolean-like flag. These helpers classify keys and produce
//! operator-facing labels and units for table rendering; they are pure
//! string functions with no protocol side effects.

use serde::{Deserialize, Serialize};

/// Kind of firmware parameter, by key suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// Read-only telemetry (`_STATE`).
    State,
    /// Writable setpoint (`_SETPOINT`).
    Setpoint,
    /// Writable setup parameter (`_SETUP`).
    Setup,
    /// Writable boolean-like mode flag (`_MODE`, values "0"/"1").
    Mode,
    /// No recognized suffix.
    Other,
}

impl KeyKind {
    /// Classify a firmware key by its suffix.
    pub fn classify(key: &str) -> Self {
        if key.ends_with("_STATE") {
            KeyKind::State
        } else if key.ends_with("_SETPOINT") {
            KeyKind::Setpoint
        } else if key.ends_with("_SETUP") {
            KeyKind::Setup
        } else if key.ends_with("_MODE") {
            KeyKind::Mode
        } else {
            KeyKind::Other
        }
    }

    /// Whether the parameter accepts writes.
    pub fn is_writable(self) -> bool {
        matches!(self, KeyKind::Setpoint | KeyKind::Setup | KeyKind::Mode)
    }
}

/// Strip a recognized suffix, returning the bare parameter name.
pub fn base_name(key: &str) -> &str {
    for suffix in ["_STATE", "_SETPOINT", "_SETUP", "_MODE"] {
        if let Some(stripped) = key.strip_suffix(suffix) {
            return stripped;
        }
    }
    key
}

/// Turn a firmware key like `MainHeaterTemperature_STATE` into
/// `Main Heater Temperature`: the suffix is dropped, camel-case word
/// boundaries become spaces, and underscores become spaces.
pub fn humanize_key(key: &str) -> String {
    let base = base_name(key);
    let mut out = String::with_capacity(base.len() + 4);
    let mut prev_lower = false;
    for ch in base.chars() {
        if ch == '_' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = ch.is_ascii_lowercase();
        out.push(ch);
    }
    out
}

/// Unit suffix for a firmware key, matched on name fragments the firmware
/// uses consistently.
pub fn unit_for_key(key: &str) -> &'static str {
    let lower = key.to_ascii_lowercase();
    if lower.contains("temperature") {
        "\u{00B0}C"
    } else if lower.contains("vacuum") && key.contains("STATE") {
        " cmH\u{2082}O"
    } else if lower.contains("vacuum") && key.contains("SETPOINT") {
        "%"
    } else if lower.contains("flow") || lower.contains("speed") {
        "%"
    } else if lower.contains("timeout") {
        "s"
    } else if lower.contains("pressure") {
        " psi"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_classification() {
        assert_eq!(KeyKind::classify("FluidTemperature_STATE"), KeyKind::State);
        assert_eq!(KeyKind::classify("Vacuum_SETPOINT"), KeyKind::Setpoint);
        assert_eq!(KeyKind::classify("StaticIP_SETUP"), KeyKind::Setup);
        assert_eq!(KeyKind::classify("Run_MODE"), KeyKind::Mode);
        assert_eq!(KeyKind::classify("AlarmStatus"), KeyKind::Other);
    }

    #[test]
    fn writability_follows_kind() {
        assert!(!KeyKind::State.is_writable());
        assert!(KeyKind::Setpoint.is_writable());
        assert!(KeyKind::Setup.is_writable());
        assert!(KeyKind::Mode.is_writable());
        assert!(!KeyKind::Other.is_writable());
    }

    #[test]
    fn humanize_splits_camel_case_and_drops_suffix() {
        assert_eq!(humanize_key("MainHeaterTemperature_STATE"), "Main Heater Temperature");
        assert_eq!(humanize_key("Run_MODE"), "Run");
        assert_eq!(humanize_key("BulkSupplyTimeout_SETPOINT"), "Bulk Supply Timeout");
        assert_eq!(humanize_key("AlarmStatus"), "Alarm Status");
    }

    #[test]
    fn units_match_firmware_conventions() {
        assert_eq!(unit_for_key("FluidTemperature_STATE"), "\u{00B0}C");
        assert_eq!(unit_for_key("Vacuum_STATE"), " cmH\u{2082}O");
        assert_eq!(unit_for_key("Vacuum_SETPOINT"), "%");
        assert_eq!(unit_for_key("Flow_SETPOINT"), "%");
        assert_eq!(unit_for_key("InputPumpSpeed_SETPOINT"), "%");
        assert_eq!(unit_for_key("BulkSupplyTimeout_SETPOINT"), "s");
        assert_eq!(unit_for_key("PressureMAX_SETPOINT"), " psi");
        assert_eq!(unit_for_key("Run_MODE"), "");
    }
}
