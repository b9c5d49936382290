//! Connection state and operator log types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the physical link. Exactly one value is live at a time,
/// owned and written solely by the session through the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// An I/O fault occurred while connected; teardown to `Disconnected`
    /// follows automatically.
    Error,
}

impl ConnectionState {
    /// Whether outbound commands are accepted in this state.
    pub fn can_send(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Severity of an operator-facing log entry.
///
/// `Command` marks operator actions (mode toggles, setpoint writes) so the
/// log view can render them distinctly from faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
    Command,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Command => "command",
        };
        f.write_str(s)
    }
}

/// A timestamped operator log entry. Retention is a consumer concern; the
/// store only delivers entries to current subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(severity: LogSeverity, message: impl Into<String>) -> Self {
        Self { severity, message: message.into(), timestamp: Utc::now() }
    }
}
