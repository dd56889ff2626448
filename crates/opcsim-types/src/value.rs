//! The tagged value carried by every node.
//!
//! [`TagValue`] serializes untagged, so on the wire a numeric tag is a
//! plain JSON number, a text tag a string and a boolean tag a bool.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::VariableKind;

/// Current value of a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(untagged)]
pub enum TagValue {
    /// Floating-point value of a numeric tag.
    Numeric(f64),
    /// Value of a string tag.
    Text(String),
    /// Value of a boolean tag.
    Flag(bool),
}

impl TagValue {
    /// Short name of the carried type, used in mismatch messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "number",
            Self::Text(_) => "string",
            Self::Flag(_) => "bool",
        }
    }

    /// Return the numeric payload, if any.
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Text(_) | Self::Flag(_) => None,
        }
    }

    /// Convert this value into the given kind.
    ///
    /// Returns `None` when no sensible conversion exists: unparseable or
    /// non-finite numbers, and strings that are not a recognised boolean
    /// spelling (`true/false/1/0/yes/no/on/off`, case-insensitive).
    pub fn coerce(self, kind: VariableKind) -> Option<Self> {
        match kind {
            VariableKind::Numeric => {
                let number = match self {
                    Self::Numeric(v) => v,
                    Self::Text(s) => s.trim().parse::<f64>().ok()?,
                    Self::Flag(b) => {
                        if b {
                            1.0
                        } else {
                            0.0
                        }
                    }
                };
                number.is_finite().then_some(Self::Numeric(number))
            }
            VariableKind::Text => Some(Self::Text(match self {
                Self::Numeric(v) => v.to_string(),
                Self::Text(s) => s,
                Self::Flag(b) => b.to_string(),
            })),
            VariableKind::Boolean => match self {
                Self::Flag(b) => Some(Self::Flag(b)),
                Self::Numeric(v) => (!v.is_nan()).then_some(Self::Flag(v.abs() > 0.0)),
                Self::Text(s) => parse_flag(&s).map(Self::Flag),
            },
        }
    }
}

impl core::fmt::Display for TagValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        Self::Numeric(v)
    }
}

impl From<bool> for TagValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Round to two decimal places, the precision every numeric tag is
/// published with.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn untagged_json_shapes() {
        let v: TagValue = serde_json::from_str("12.5").unwrap();
        assert_eq!(v, TagValue::Numeric(12.5));
        let v: TagValue = serde_json::from_str("7").unwrap();
        assert_eq!(v, TagValue::Numeric(7.0));
        let v: TagValue = serde_json::from_str("\"Idle\"").unwrap();
        assert_eq!(v, TagValue::Text(String::from("Idle")));
        let v: TagValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, TagValue::Flag(true));
        assert_eq!(serde_json::to_string(&TagValue::Flag(false)).unwrap(), "false");
    }

    #[test]
    fn coerce_to_numeric() {
        assert_eq!(
            TagValue::from(" 42.5 ").coerce(VariableKind::Numeric),
            Some(TagValue::Numeric(42.5))
        );
        assert_eq!(
            TagValue::Flag(true).coerce(VariableKind::Numeric),
            Some(TagValue::Numeric(1.0))
        );
        assert_eq!(TagValue::from("hot").coerce(VariableKind::Numeric), None);
        assert_eq!(TagValue::from("NaN").coerce(VariableKind::Numeric), None);
        assert_eq!(TagValue::Numeric(f64::INFINITY).coerce(VariableKind::Numeric), None);
    }

    #[test]
    fn coerce_to_text() {
        assert_eq!(
            TagValue::Numeric(3.25).coerce(VariableKind::Text),
            Some(TagValue::from("3.25"))
        );
        assert_eq!(
            TagValue::Flag(false).coerce(VariableKind::Text),
            Some(TagValue::from("false"))
        );
    }

    #[test]
    fn coerce_to_boolean() {
        assert_eq!(
            TagValue::from("ON").coerce(VariableKind::Boolean),
            Some(TagValue::Flag(true))
        );
        assert_eq!(
            TagValue::from("0").coerce(VariableKind::Boolean),
            Some(TagValue::Flag(false))
        );
        assert_eq!(
            TagValue::Numeric(0.0).coerce(VariableKind::Boolean),
            Some(TagValue::Flag(false))
        );
        assert_eq!(
            TagValue::Numeric(-2.0).coerce(VariableKind::Boolean),
            Some(TagValue::Flag(true))
        );
        assert_eq!(TagValue::from("maybe").coerce(VariableKind::Boolean), None);
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert!((round2(50.004_9) - 50.0).abs() < f64::EPSILON);
        assert!((round2(12.345_6) - 12.35).abs() < 1e-9);
        assert!((round2(-0.126) + 0.13).abs() < 1e-9);
    }
}
