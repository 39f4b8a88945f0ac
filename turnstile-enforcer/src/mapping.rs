//! Role-mapping policies.

use serde::{Deserialize, Serialize};

use crate::adapter::PolicyRecord;

/// A stored role-inheritance rule: `(name, child, parent)` for 2-arg
/// mappings or `(name, child, parent, domain)` for domain-qualified ones.
///
/// Identity is structural, including the domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPolicy {
    name: String,
    child: String,
    parent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
}

impl MappingPolicy {
    /// Creates a plain inheritance rule: `child` has role `parent`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        child: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            child: child.into(),
            parent: parent.into(),
            domain: None,
        }
    }

    /// Creates a domain-qualified inheritance rule.
    #[must_use]
    pub fn with_domain(
        name: impl Into<String>,
        child: impl Into<String>,
        parent: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            child: child.into(),
            parent: parent.into(),
            domain: Some(domain.into()),
        }
    }

    /// Returns the role-mapping name, e.g. `g`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the inheriting role.
    #[must_use]
    pub fn child(&self) -> &str {
        &self.child
    }

    /// Returns the inherited role.
    #[must_use]
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Returns the domain of a domain-qualified rule.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Number of tuple elements after the name: 2 or 3.
    #[must_use]
    pub fn value_count(&self) -> usize {
        if self.domain.is_some() { 3 } else { 2 }
    }

    /// The graph vertex this rule's edge starts from. Domain-qualified
    /// rules fold the domain onto the role to form one opaque key, so
    /// inheritance chains connect only within their own domain.
    #[must_use]
    pub fn edge_source(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}{domain}", self.child),
            None => self.child.clone(),
        }
    }

    /// The graph vertex this rule's edge points at; domain folding as in
    /// [`MappingPolicy::edge_source`].
    #[must_use]
    pub fn edge_target(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}{domain}", self.parent),
            None => self.parent.clone(),
        }
    }

    /// Renders the rule as an adapter record.
    #[must_use]
    pub fn to_record(&self) -> PolicyRecord {
        let mut record = vec![self.name.clone(), self.child.clone(), self.parent.clone()];
        if let Some(domain) = &self.domain {
            record.push(domain.clone());
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_endpoints_concatenate_the_domain() {
        let plain = MappingPolicy::new("g", "bob", "reader");
        assert_eq!(plain.edge_source(), "bob");
        assert_eq!(plain.edge_target(), "reader");
        assert_eq!(plain.value_count(), 2);

        let qualified = MappingPolicy::with_domain("g", "alice", "admin", "domain1");
        assert_eq!(qualified.edge_source(), "alicedomain1");
        assert_eq!(qualified.edge_target(), "admindomain1");
        assert_eq!(qualified.value_count(), 3);
    }

    #[test]
    fn records_include_the_domain_only_when_present() {
        assert_eq!(
            MappingPolicy::new("g", "bob", "reader").to_record(),
            ["g", "bob", "reader"]
        );
        assert_eq!(
            MappingPolicy::with_domain("g2", "alice", "admin", "d1").to_record(),
            ["g2", "alice", "admin", "d1"]
        );
    }

    #[test]
    fn identity_is_structural() {
        let a = MappingPolicy::with_domain("g", "alice", "admin", "d1");
        let b = MappingPolicy::with_domain("g", "alice", "admin", "d1");
        let c = MappingPolicy::with_domain("g", "alice", "admin", "d2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
