//! Directed role graph with transitive reachability.

use std::collections::{HashMap, HashSet};

/// The inheritance graph for one role-mapping name.
///
/// Edges point from child to parent: `add_inheritance("bob", "reader")`
/// records that `bob` holds the `reader` role. Reachability is transitive
/// and reflexive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleGroup {
    name: String,
    edges: HashMap<String, HashSet<String>>,
}

impl RoleGroup {
    /// Creates an empty group for the given role-mapping name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            edges: HashMap::new(),
        }
    }

    /// Returns the role-mapping name this group belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts a vertex if absent.
    pub fn add_role(&mut self, role: impl Into<String>) {
        self.edges.entry(role.into()).or_default();
    }

    /// Inserts both vertices if absent and records `child -> parent`.
    pub fn add_inheritance(&mut self, child: impl Into<String>, parent: impl Into<String>) {
        let parent = parent.into();
        self.add_role(parent.clone());
        self.edges.entry(child.into()).or_default().insert(parent);
    }

    /// Deletes the `child -> parent` edge if present. Vertices remain.
    pub fn remove_inheritance(&mut self, child: &str, parent: &str) {
        if let Some(parents) = self.edges.get_mut(child) {
            parents.remove(parent);
        }
    }

    /// True iff `child == parent` or the graph has a path from `child` to
    /// `parent`.
    #[must_use]
    pub fn has_inheritance(&self, child: &str, parent: &str) -> bool {
        if child == parent {
            return true;
        }

        // Iterative depth-first search.
        let mut visited: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&str> = vec![child];
        while let Some(role) = pending.pop() {
            if !visited.insert(role) {
                continue;
            }
            let Some(parents) = self.edges.get(role) else {
                continue;
            };
            for next in parents {
                if next == parent {
                    return true;
                }
                pending.push(next);
            }
        }
        false
    }

    /// Roles `child` inherits directly (one hop), sorted for stable output.
    #[must_use]
    pub fn direct_parents(&self, child: &str) -> Vec<&str> {
        let mut parents: Vec<&str> = self
            .edges
            .get(child)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default();
        parents.sort_unstable();
        parents
    }

    /// Roles that inherit `parent` directly (one hop), sorted for stable
    /// output.
    #[must_use]
    pub fn direct_children(&self, parent: &str) -> Vec<&str> {
        let mut children: Vec<&str> = self
            .edges
            .iter()
            .filter(|(_, parents)| parents.contains(parent))
            .map(|(child, _)| child.as_str())
            .collect();
        children.sort_unstable();
        children
    }

    /// Iterates all known role identifiers.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// Drops every edge and vertex.
    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inheritance_is_reflexive() {
        let group = RoleGroup::new("g");
        assert!(group.has_inheritance("anyone", "anyone"));
    }

    #[test]
    fn inheritance_is_directional() {
        let mut group = RoleGroup::new("g");
        group.add_inheritance("bob", "reader");
        assert!(group.has_inheritance("bob", "reader"));
        assert!(!group.has_inheritance("reader", "bob"));
    }

    #[test]
    fn inheritance_is_transitive() {
        let mut group = RoleGroup::new("g");
        group.add_inheritance("alice", "admin");
        group.add_inheritance("admin", "author");
        group.add_inheritance("author", "reader");
        assert!(group.has_inheritance("alice", "reader"));
        assert!(!group.has_inheritance("reader", "alice"));
    }

    #[test]
    fn cycles_terminate() {
        let mut group = RoleGroup::new("g");
        group.add_inheritance("a", "b");
        group.add_inheritance("b", "a");
        assert!(group.has_inheritance("a", "b"));
        assert!(!group.has_inheritance("a", "c"));
    }

    #[test]
    fn removing_an_edge_keeps_the_vertices() {
        let mut group = RoleGroup::new("g");
        group.add_inheritance("bob", "reader");
        group.remove_inheritance("bob", "reader");
        assert!(!group.has_inheritance("bob", "reader"));
        let roles: Vec<_> = group.roles().collect();
        assert!(roles.contains(&"bob"));
        assert!(roles.contains(&"reader"));
    }

    #[test]
    fn direct_neighbors_are_one_hop_only() {
        let mut group = RoleGroup::new("g");
        group.add_inheritance("alice", "admin");
        group.add_inheritance("admin", "reader");
        group.add_inheritance("bob", "reader");

        assert_eq!(group.direct_parents("alice"), ["admin"]);
        assert_eq!(group.direct_parents("admin"), ["reader"]);
        assert!(group.direct_parents("reader").is_empty());
        assert_eq!(group.direct_children("reader"), ["admin", "bob"]);
        assert!(group.direct_children("ghost").is_empty());
    }

    #[test]
    fn removing_a_missing_edge_is_a_no_op() {
        let mut group = RoleGroup::new("g");
        group.remove_inheritance("ghost", "nobody");
        assert_eq!(group.roles().count(), 0);
    }
}
