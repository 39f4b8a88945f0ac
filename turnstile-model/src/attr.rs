//! Attribute values carried by requests and policies.

use std::fmt;

use serde::{Deserialize, Serialize};
use turnstile_matcher::Value;

use crate::ModelError;

/// A request or policy attribute value: a string or a number.
///
/// This is the storage-facing subset of the matcher's [`Value`]; booleans,
/// records, and functions exist only during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// A string value.
    Str(String),
    /// A numeric value.
    Num(f64),
}

impl AttrValue {
    /// Returns the contained string, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            Self::Num(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            // Whole numbers print without a trailing `.0` so policy files
            // round-trip cleanly.
            Self::Num(n) if n.fract() == 0.0 && n.is_finite() => {
                write!(f, "{}", *n as i64)
            }
            Self::Num(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<i64> for AttrValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Num(value as f64)
    }
}

impl From<AttrValue> for Value {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Str(s) => Self::Str(s),
            AttrValue::Num(n) => Self::Num(n),
        }
    }
}

impl From<&AttrValue> for Value {
    fn from(value: &AttrValue) -> Self {
        value.clone().into()
    }
}

impl TryFrom<Value> for AttrValue {
    type Error = ModelError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Str(s) => Ok(Self::Str(s)),
            Value::Num(n) => Ok(Self::Num(n)),
            _ => Err(ModelError::InvalidAttrType),
        }
    }
}
