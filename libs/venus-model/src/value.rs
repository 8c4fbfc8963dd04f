//! Typed signal values.

use std::fmt;

use serde::Serialize;

/// A decoded signal value as held in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(_) | Value::Text(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Round to `digits` decimal places.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Apply a scale factor to a raw integer reading. A scale of exactly
/// 1 keeps the integer representation; anything else produces a float
/// rounded to three decimals, matching the device's documented
/// precision.
pub fn apply_scale(raw: i64, scale: f64) -> Value {
    if scale == 1.0 {
        Value::Int(raw)
    } else {
        Value::Float(round_to(raw as f64 * scale, 3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_scale_stays_integral() {
        assert_eq!(apply_scale(215, 1.0), Value::Int(215));
    }

    #[test]
    fn scale_produces_rounded_float() {
        assert_eq!(apply_scale(215, 0.1), Value::Float(21.5));
        assert_eq!(apply_scale(3333, 0.001), Value::Float(3.333));
        // Negative scale (e.g. WiFi RSSI stored as positive dBm)
        assert_eq!(apply_scale(67, -1.0), Value::Float(-67.0));
    }

    #[test]
    fn values_serialize_untagged() {
        assert_eq!(serde_json::to_string(&Value::Int(215)).unwrap(), "215");
        assert_eq!(serde_json::to_string(&Value::Float(21.5)).unwrap(), "21.5");
        assert_eq!(serde_json::to_string(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(
            serde_json::to_string(&Value::Text("Charge".into())).unwrap(),
            "\"Charge\""
        );
    }

    #[test]
    fn value_accessors() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Bool(true).as_f64(), None);
        assert_eq!(Value::Text("abc".into()).as_text(), Some("abc"));
    }
}
