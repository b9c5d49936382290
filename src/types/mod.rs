//! Core types for the serial telemetry link.
//!
//! - [`WireValue`] is the tagged scalar union the firmware speaks
//! - [`Frame`] is one decoded JSON object from the stream
//! - [`ConnectionState`] is the link lifecycle enumeration
//! - [`LogEntry`] / [`LogSeverity`] are the operator log payloads

mod state;
mod wire;

pub use state::{ConnectionState, LogEntry, LogSeverity};
pub use wire::{Frame, WireValue};
