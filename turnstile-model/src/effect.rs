//! Effect rules folding matched policies into a decision.

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// How multiple matched policies combine into a single allow/deny answer.
///
/// Exactly two rule strings are recognized; anything else fails model
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEffect {
    /// `some(where(p.eft==allow))`: at least one matched policy must allow.
    AllowOverride,
    /// `!some(where(p.eft==deny))`: no matched policy may deny. An empty
    /// match set is vacuously allowed.
    DenyOverride,
}

impl PolicyEffect {
    /// Recognizes an effect rule string. Whitespace is insignificant, so
    /// `some(where (p.eft == allow))` and `some(where(p.eft==allow))` are
    /// the same rule.
    pub(crate) fn parse(rule: &str) -> ModelResult<Self> {
        let compact: String = rule.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "some(where(p.eft==allow))" => Ok(Self::AllowOverride),
            "!some(where(p.eft==deny))" => Ok(Self::DenyOverride),
            _ => Err(ModelError::InvalidPolicyEffect),
        }
    }

    /// Folds the `eft` values of the matched policies into a decision.
    pub(crate) fn resolve<'a>(self, efts: impl IntoIterator<Item = &'a str>) -> bool {
        match self {
            Self::AllowOverride => efts.into_iter().any(|eft| eft == "allow"),
            Self::DenyOverride => !efts.into_iter().any(|eft| eft == "deny"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_exactly_two_rules() {
        assert_eq!(
            PolicyEffect::parse("some(where (p.eft == allow))").unwrap(),
            PolicyEffect::AllowOverride
        );
        assert_eq!(
            PolicyEffect::parse("!some(where(p.eft==deny))").unwrap(),
            PolicyEffect::DenyOverride
        );
        assert!(matches!(
            PolicyEffect::parse("priority(p.eft)"),
            Err(ModelError::InvalidPolicyEffect)
        ));
    }

    #[test]
    fn allow_override_requires_an_allow() {
        let effect = PolicyEffect::AllowOverride;
        assert!(!effect.resolve([]));
        assert!(effect.resolve(["allow"]));
        assert!(!effect.resolve(["deny"]));
        assert!(effect.resolve(["deny", "allow"]));
    }

    #[test]
    fn deny_override_is_vacuously_true() {
        let effect = PolicyEffect::DenyOverride;
        assert!(effect.resolve([]));
        assert!(effect.resolve(["allow"]));
        assert!(!effect.resolve(["deny"]));
        assert!(!effect.resolve(["allow", "deny"]));
    }
}
