//! Wire value and frame types for firmware telemetry.
//!
//! The controller firmware reports values as JSON scalars with no schema:
//! numbers and `"0"`/`"1"` flags arrive interchangeably as strings or
//! numbers. [`WireValue`] makes that a tagged union so consumers coerce
//! explicitly instead of guessing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single scalar value as reported on the wire.
///
/// The firmware does not distinguish `42` from `"42"` or `1` from `"1"`;
/// both spellings occur for the same key across firmware revisions. The
/// coercion helpers encode the two sanctioned readings (numeric and
/// boolean flag) so that the guesswork lives here and nowhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    /// JSON `true`/`false`.
    Bool(bool),
    /// Any JSON number, widened to `f64`.
    Number(f64),
    /// A JSON string, kept verbatim.
    Text(String),
}

impl WireValue {
    /// Strict numeric read: only a JSON number is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Lenient numeric read: also parses numeric text like `"42.5"`.
    pub fn coerce_f64(&self) -> Option<f64> {
        match self {
            WireValue::Number(n) => Some(*n),
            WireValue::Text(s) => s.trim().parse().ok(),
            WireValue::Bool(_) => None,
        }
    }

    /// Read a firmware mode flag. Accepts `true`/`false`, `0`/`1`, and the
    /// string forms `"0"`/`"1"`.
    pub fn coerce_flag(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            WireValue::Number(n) if *n == 0.0 => Some(false),
            WireValue::Number(n) if *n == 1.0 => Some(true),
            WireValue::Text(s) => match s.trim() {
                "0" => Some(false),
                "1" => Some(true),
                _ => None,
            },
            _ => None,
        }
    }

    /// String read without coercion.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WireValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Bool(b) => write!(f, "{b}"),
            WireValue::Number(n) => write!(f, "{n}"),
            WireValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        WireValue::Text(s.to_string())
    }
}

impl From<f64> for WireValue {
    fn from(n: f64) -> Self {
        WireValue::Number(n)
    }
}

/// One complete JSON object extracted from the serial stream.
///
/// A frame is a flat mapping of firmware tag to scalar value, either a
/// telemetry snapshot fragment or a command echo. Frames carry no sequence
/// number; ordering is whatever the byte stream delivered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(pub BTreeMap<String, WireValue>);

impl Frame {
    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&WireValue> {
        self.0.get(key)
    }

    /// Number of keys in the frame.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the frame carries no keys (`{}` is a valid frame).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over key/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &WireValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, WireValue)> for Frame {
    fn from_iter<I: IntoIterator<Item = (String, WireValue)>>(iter: I) -> Self {
        Frame(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_deserializes_mixed_scalars() {
        let frame: Frame =
            serde_json::from_str(r#"{"Temp_STATE":42.5,"Run_MODE":"1","Armed":true}"#).unwrap();
        assert_eq!(frame.get("Temp_STATE"), Some(&WireValue::Number(42.5)));
        assert_eq!(frame.get("Run_MODE"), Some(&WireValue::Text("1".into())));
        assert_eq!(frame.get("Armed"), Some(&WireValue::Bool(true)));
    }

    #[test]
    fn integer_values_widen_to_f64() {
        let frame: Frame = serde_json::from_str(r#"{"Flow_SETPOINT":30}"#).unwrap();
        assert_eq!(frame.get("Flow_SETPOINT").unwrap().as_f64(), Some(30.0));
    }

    #[test]
    fn flag_coercion_accepts_both_spellings() {
        assert_eq!(WireValue::Text("1".into()).coerce_flag(), Some(true));
        assert_eq!(WireValue::Text("0".into()).coerce_flag(), Some(false));
        assert_eq!(WireValue::Number(1.0).coerce_flag(), Some(true));
        assert_eq!(WireValue::Bool(false).coerce_flag(), Some(false));
        assert_eq!(WireValue::Text("banana".into()).coerce_flag(), None);
    }

    #[test]
    fn strict_and_lenient_numeric_reads_differ() {
        let text = WireValue::Text("42.5".into());
        assert_eq!(text.as_f64(), None);
        assert_eq!(text.coerce_f64(), Some(42.5));
    }

    #[test]
    fn nested_objects_are_rejected() {
        // The wire format is a flat scalar map; nesting is a malformed frame.
        let result: Result<Frame, _> = serde_json::from_str(r#"{"a":{"b":1}}"#);
        assert!(result.is_err());
    }
}
