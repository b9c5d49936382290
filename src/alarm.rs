//! Alarm/status decoding.
//!
//! The firmware reports a compound status string, optionally prefixed with
//! an operational mode: `NO_ERROR`, `HEATER_TC_ERROR`, `RUN-HEATER_ERROR`.
//! The prefix (RUN, STOP, PURGE, FLUSH, DRAIN) names the controller's
//! operating mode; the remainder is an error code resolved against a static
//! table. Unrecognized codes fall back to a generic unknown-error entry and
//! never block snapshot updates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The status code meaning "nothing wrong".
pub const NO_ERROR: &str = "NO_ERROR";

/// Severity of a decoded firmware error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Operational mode reported as a status prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpMode {
    Running,
    Stopped,
    Purging,
    Flushing,
    Draining,
}

impl OpMode {
    /// Parse a status prefix like `RUN` or `PURGE`.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "RUN" => Some(OpMode::Running),
            "STOP" => Some(OpMode::Stopped),
            "PURGE" => Some(OpMode::Purging),
            "FLUSH" => Some(OpMode::Flushing),
            "DRAIN" => Some(OpMode::Draining),
            _ => None,
        }
    }

    /// Operator-facing label.
    pub fn label(self) -> &'static str {
        match self {
            OpMode::Running => "Running",
            OpMode::Stopped => "Stopped",
            OpMode::Purging => "Purging",
            OpMode::Flushing => "Flushing",
            OpMode::Draining => "Draining",
        }
    }
}

impl fmt::Display for OpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A resolved firmware error: code plus the table entry describing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmError {
    pub code: String,
    pub title: String,
    pub detail: String,
    pub action: String,
    pub severity: Severity,
}

impl AlarmError {
    /// Whether this is a real error condition rather than `NO_ERROR`.
    pub fn is_active(&self) -> bool {
        is_active_error(&self.code)
    }
}

/// Decoded compound status: optional operating mode plus resolved error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmStatus {
    pub op_mode: Option<OpMode>,
    pub error: AlarmError,
}

struct TableEntry {
    code: &'static str,
    title: &'static str,
    detail: &'static str,
    action: &'static str,
    severity: Severity,
}

const RESERVED_ACTION: &str = "Contact support if this error persists.";

static ERROR_TABLE: &[TableEntry] = &[
    TableEntry {
        code: "NO_ERROR",
        title: "No Error",
        detail: "System operating normally.",
        action: "No action required.",
        severity: Severity::Info,
    },
    TableEntry {
        code: "HEATER_ERROR",
        title: "Heater Error",
        detail: "Heater temperature exceeds maximum setpoint or heater control failure.",
        action: "Check heater wiring and TemperatureMAX setpoint. Power cycle if needed.",
        severity: Severity::Critical,
    },
    TableEntry {
        code: "HEATER_TC_ERROR",
        title: "Heater Thermocouple Error",
        detail: "Heater thermocouple is disconnected or reading out of range.",
        action: "Inspect thermocouple connections on heater assembly.",
        severity: Severity::Critical,
    },
    TableEntry {
        code: "FLUID_TC_ERROR",
        title: "Fluid Thermocouple Error",
        detail: "Fluid thermocouple is disconnected or reading out of range.",
        action: "Inspect fluid thermocouple wiring and connections.",
        severity: Severity::Critical,
    },
    TableEntry {
        code: "FLOAT_ERROR",
        title: "Float Switch Error",
        detail: "One or more float switches triggered an unexpected state.",
        action: "Check fluid levels and inspect float switch wiring.",
        severity: Severity::Warning,
    },
    TableEntry {
        code: "I2C_ERROR",
        title: "I2C Communication Error",
        detail: "I2C bus communication failure with a peripheral device.",
        action: "Check I2C wiring and device addresses. Power cycle peripherals.",
        severity: Severity::Critical,
    },
];

/// Look up an error code, including the reserved OPEN1..OPEN11 slots and
/// the unknown-code fallback. Never fails.
pub fn lookup_error(code: &str) -> AlarmError {
    if let Some(entry) = ERROR_TABLE.iter().find(|entry| entry.code == code) {
        return AlarmError {
            code: code.to_string(),
            title: entry.title.to_string(),
            detail: entry.detail.to_string(),
            action: entry.action.to_string(),
            severity: entry.severity,
        };
    }
    if let Some(slot) = reserved_slot(code) {
        return AlarmError {
            code: code.to_string(),
            title: format!("Open Error {slot}"),
            detail: format!("Reserved error code (OPEN{slot})."),
            action: RESERVED_ACTION.to_string(),
            severity: Severity::Warning,
        };
    }
    unknown_error(code)
}

/// Firmware reserves OPEN1_ERROR..OPEN11_ERROR for future conditions.
fn reserved_slot(code: &str) -> Option<u8> {
    let inner = code.strip_prefix("OPEN")?.strip_suffix("_ERROR")?;
    let slot: u8 = inner.parse().ok()?;
    (1..=11).contains(&slot).then_some(slot)
}

fn unknown_error(code: &str) -> AlarmError {
    let shown = if code.is_empty() { "(empty)" } else { code };
    AlarmError {
        code: if code.is_empty() { "UNKNOWN".to_string() } else { code.to_string() },
        title: "Unknown Error".to_string(),
        detail: format!("Unrecognized error code: {shown}"),
        action: "Check firmware documentation or contact support.".to_string(),
        severity: Severity::Warning,
    }
}

/// Whether a code denotes an active error condition.
pub fn is_active_error(code: &str) -> bool {
    !code.is_empty() && code != NO_ERROR
}

/// Decode a compound status string from firmware.
///
/// A leading `<PREFIX>-` is consumed only when the prefix is a recognized
/// operational mode; otherwise the whole string is treated as a bare error
/// code with no mode annotation.
pub fn decode_alarm_status(raw: &str) -> AlarmStatus {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return AlarmStatus { op_mode: None, error: unknown_error("") };
    }

    let (op_mode, code) = match trimmed.split_once('-') {
        Some((prefix, rest)) if !prefix.is_empty() => match OpMode::from_prefix(prefix) {
            Some(mode) => (Some(mode), rest),
            None => (None, trimmed),
        },
        _ => (None, trimmed),
    };

    AlarmStatus { op_mode, error: lookup_error(code) }
}
