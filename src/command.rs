//! Outbound command builders.
//!
//! Every outbound message is a single flat JSON object terminated by `\n`
//! (the session appends the terminator). Values are sent as strings, the
//! firmware convention even for numeric setpoints: `{"Run_MODE":"1"}`,
//! `{"Vacuum_SETPOINT":"35"}`, `{"GET":"ALL"}`.

use std::fmt;

use crate::config::STATUS_REQUEST;

/// A typed outbound command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Request a full status broadcast (`{"GET":"ALL"}`); also the poll body.
    GetAll,
    /// Set a boolean-like mode flag, e.g. `Run` on -> `{"Run_MODE":"1"}`.
    SetMode { name: String, on: bool },
    /// Write a numeric setpoint, e.g. `{"Vacuum_SETPOINT":"35"}`.
    SetPoint { name: String, value: f64 },
    /// Write a setup parameter verbatim, e.g. `{"StaticIP1_SETUP":"192"}`.
    Setup { name: String, value: String },
    /// Pre-encoded JSON text, passed through unchanged.
    Raw(String),
}

impl Command {
    /// Convenience constructor for mode flags.
    pub fn set_mode(name: impl Into<String>, on: bool) -> Self {
        Command::SetMode { name: name.into(), on }
    }

    /// Convenience constructor for setpoints.
    pub fn set_point(name: impl Into<String>, value: f64) -> Self {
        Command::SetPoint { name: name.into(), value }
    }

    /// Trigger the firmware watchdog, rebooting the controller.
    pub fn watchdog_reboot() -> Self {
        Command::set_mode("WatchdogTrigger", true)
    }

    /// Encode to the single-object JSON text written to the link.
    pub fn encode(&self) -> String {
        match self {
            Command::GetAll => STATUS_REQUEST.to_string(),
            Command::SetMode { name, on } => {
                let flag = if *on { "1" } else { "0" };
                format!("{{\"{name}_MODE\":\"{flag}\"}}")
            }
            Command::SetPoint { name, value } => {
                // Integral values print without a trailing ".0"; the
                // firmware parses either form.
                if value.fract() == 0.0 && value.is_finite() {
                    format!("{{\"{name}_SETPOINT\":\"{}\"}}", *value as i64)
                } else {
                    format!("{{\"{name}_SETPOINT\":\"{value}\"}}")
                }
            }
            Command::Setup { name, value } => {
                let mut map = serde_json::Map::new();
                map.insert(format!("{name}_SETUP"), serde_json::Value::String(value.clone()));
                serde_json::Value::Object(map).to_string()
            }
            Command::Raw(text) => text.clone(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
