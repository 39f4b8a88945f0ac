//! Request, policy, and role-mapping definitions parsed from a model file.

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// The reserved policy attribute holding the rule's effect.
pub const EFT_ATTR: &str = "eft";

fn parse_attr_list(raw: &str) -> Option<Vec<String>> {
    let attrs: Vec<String> = raw.split(',').map(|a| a.trim().to_owned()).collect();
    if attrs.iter().any(String::is_empty) {
        return None;
    }
    // Attribute names must be distinct.
    for (i, attr) in attrs.iter().enumerate() {
        if attrs[..i].contains(attr) {
            return None;
        }
    }
    Some(attrs)
}

/// The shape of a request: its key and ordered attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDefinition {
    key: String,
    attrs: Vec<String>,
}

impl RequestDefinition {
    pub(crate) fn new(key: impl Into<String>, raw_attrs: &str) -> ModelResult<Self> {
        let attrs = parse_attr_list(raw_attrs).ok_or(ModelError::InvalidRequestDefinition)?;
        Ok(Self {
            key: key.into(),
            attrs,
        })
    }

    /// Returns the request key, typically `r`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the ordered attribute names.
    #[must_use]
    pub fn attrs(&self) -> &[String] {
        &self.attrs
    }

    /// Number of attributes a request tuple must carry.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.attrs.len()
    }
}

/// The shape of a policy rule: its key and ordered attribute names, always
/// ending in the reserved `eft` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    key: String,
    attrs: Vec<String>,
}

impl PolicyDefinition {
    /// Synthesizes a trailing `eft` when the definition omits it.
    pub(crate) fn new(key: impl Into<String>, raw_attrs: &str) -> ModelResult<Self> {
        let mut attrs = parse_attr_list(raw_attrs).ok_or(ModelError::InvalidPolicyDefinition)?;
        if attrs.last().map(String::as_str) != Some(EFT_ATTR) {
            if attrs.iter().any(|a| a == EFT_ATTR) {
                // `eft` anywhere but last would make the tuple layout ambiguous.
                return Err(ModelError::InvalidPolicyDefinition);
            }
            attrs.push(EFT_ATTR.to_owned());
        }
        Ok(Self {
            key: key.into(),
            attrs,
        })
    }

    /// Returns the policy key, typically `p`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the ordered attribute names, `eft` last.
    #[must_use]
    pub fn attrs(&self) -> &[String] {
        &self.attrs
    }

    /// Number of attributes a full policy tuple carries, including `eft`.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.attrs.len()
    }
}

/// Declared argument count of a role mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleArity {
    /// `_, _`: plain child/parent inheritance.
    Two,
    /// `_, _, _`: domain-qualified inheritance.
    Three,
}

impl RoleArity {
    fn parse(raw: &str) -> ModelResult<Self> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "_,_" => Ok(Self::Two),
            "_,_,_" => Ok(Self::Three),
            _ => Err(ModelError::InvalidRoleDefinition),
        }
    }

    /// Number of arguments the matcher stub accepts.
    #[must_use]
    pub fn arg_count(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

/// A role-mapping name and its declared arity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    name: String,
    arity: RoleArity,
}

impl RoleMapping {
    pub(crate) fn new(name: impl Into<String>, raw_arity: &str) -> ModelResult<Self> {
        Ok(Self {
            name: name.into(),
            arity: RoleArity::parse(raw_arity)?,
        })
    }

    /// Returns the mapping name, e.g. `g` or `g2`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared arity.
    #[must_use]
    pub fn arity(&self) -> RoleArity {
        self.arity
    }
}
