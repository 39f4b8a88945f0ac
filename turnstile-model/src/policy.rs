//! Validated request and policy values.

use serde::{Deserialize, Serialize};
use turnstile_matcher::Value;

use crate::AttrValue;
use crate::definition::EFT_ATTR;

/// A validated request: its key and ordered attribute name/value pairs.
///
/// Constructed only through [`crate::Model::create_request`], which
/// guarantees the arity and value types match the request definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    key: String,
    attrs: Vec<(String, AttrValue)>,
}

impl Request {
    pub(crate) fn new(key: impl Into<String>, attrs: Vec<(String, AttrValue)>) -> Self {
        Self {
            key: key.into(),
            attrs,
        }
    }

    /// Returns the request key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the ordered attribute name/value pairs.
    #[must_use]
    pub fn attrs(&self) -> &[(String, AttrValue)] {
        &self.attrs
    }

    /// Builds the record value bound under the request key during matching.
    #[must_use]
    pub fn to_record(&self) -> Value {
        Value::record(self.attrs.iter().map(|(k, v)| (k.clone(), Value::from(v))))
    }
}

/// A validated policy rule: its key and ordered attribute name/value pairs,
/// the last always being `eft` with value `"allow"` or `"deny"`.
///
/// Constructed only through [`crate::Model::create_policy`]. Identity is
/// structural: two policies are the same rule iff key and all attribute
/// values (including `eft`) are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    key: String,
    attrs: Vec<(String, AttrValue)>,
}

impl Policy {
    pub(crate) fn new(key: impl Into<String>, attrs: Vec<(String, AttrValue)>) -> Self {
        Self {
            key: key.into(),
            attrs,
        }
    }

    /// Returns the policy key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the ordered attribute name/value pairs, `eft` last.
    #[must_use]
    pub fn attrs(&self) -> &[(String, AttrValue)] {
        &self.attrs
    }

    /// Returns the attribute values in definition order.
    #[must_use]
    pub fn values(&self) -> Vec<&AttrValue> {
        self.attrs.iter().map(|(_, v)| v).collect()
    }

    /// Returns the rule's effect, `"allow"` or `"deny"`.
    #[must_use]
    pub fn eft(&self) -> &str {
        self.attrs
            .iter()
            .find(|(k, _)| k == EFT_ATTR)
            .and_then(|(_, v)| v.as_str())
            .unwrap_or("allow")
    }

    /// Builds the record value bound under the policy key during matching.
    #[must_use]
    pub fn to_record(&self) -> Value {
        Value::record(self.attrs.iter().map(|(k, v)| (k.clone(), Value::from(v))))
    }
}
