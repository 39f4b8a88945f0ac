//! The persistence adapter interface.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AdapterResult;

/// One persisted rule: the ptype string first, then its values, as in
/// `["p", "alice", "blog_post", "read"]` or `["g", "bob", "reader"]`.
pub type PolicyRecord = Vec<String>;

/// Field-tag filter for [`Adapter::load_filtered_policies`].
///
/// Tags are `ptype` and `v0`..`v6`. A record matches when, for every tag
/// with accepted values, the record's corresponding field is among them. An
/// empty filter accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFilter {
    fields: HashMap<String, Vec<String>>,
}

impl PolicyFilter {
    /// Creates a filter that accepts every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the field `tag` to the given accepted values.
    #[must_use]
    pub fn accept<I, S>(mut self, tag: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(tag.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// True when no field is restricted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Applies the filter to one record. Unknown tags and fields beyond the
    /// record's length never match.
    #[must_use]
    pub fn matches(&self, record: &[String]) -> bool {
        self.fields.iter().all(|(tag, accepted)| {
            let Some(index) = field_index(tag) else {
                return false;
            };
            record
                .get(index)
                .is_some_and(|field| accepted.contains(field))
        })
    }
}

/// Maps `ptype`/`v0`..`v6` onto record positions.
fn field_index(tag: &str) -> Option<usize> {
    if tag == "ptype" {
        return Some(0);
    }
    let n: usize = tag.strip_prefix('v')?.parse().ok()?;
    (n <= 6).then_some(n + 1)
}

/// A pluggable storage backend for policy rules.
///
/// Mutating operations take `&mut self` so adapters may evolve internal
/// state (cursors, caches, connections) as they persist.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Loads every stored rule.
    async fn load_policies(&self) -> AdapterResult<Vec<PolicyRecord>>;

    /// Loads the rules accepted by `filter`.
    async fn load_filtered_policies(&self, filter: &PolicyFilter)
    -> AdapterResult<Vec<PolicyRecord>>;

    /// Persists one added rule.
    async fn add_policy(&mut self, record: &PolicyRecord) -> AdapterResult<()>;

    /// Persists one removed rule.
    async fn remove_policy(&mut self, record: &PolicyRecord) -> AdapterResult<()>;

    /// Persists removal of every rule with the given key whose values,
    /// starting at `idx`, equal `values`.
    async fn remove_filtered_policy(
        &mut self,
        key: &str,
        idx: usize,
        values: &[String],
    ) -> AdapterResult<()>;

    /// Replaces the stored rule set wholesale.
    async fn save_policies(&mut self, records: &[PolicyRecord]) -> AdapterResult<()>;
}

pub(crate) fn filtered_record_match(
    record: &[String],
    key: &str,
    idx: usize,
    values: &[String],
) -> bool {
    let Some((record_key, fields)) = record.split_first() else {
        return false;
    };
    if record_key != key {
        return false;
    }
    fields
        .get(idx..idx + values.len())
        .is_some_and(|slice| slice == values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> PolicyRecord {
        fields.iter().map(|f| (*f).to_owned()).collect()
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = PolicyFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&record(&["p", "alice", "data", "read"])));
    }

    #[test]
    fn filters_by_ptype_and_value_columns() {
        let filter = PolicyFilter::new()
            .accept("ptype", ["p"])
            .accept("v0", ["alice", "bob"]);
        assert!(filter.matches(&record(&["p", "alice", "data", "read"])));
        assert!(filter.matches(&record(&["p", "bob", "data", "read"])));
        assert!(!filter.matches(&record(&["p", "carol", "data", "read"])));
        assert!(!filter.matches(&record(&["g", "alice", "admin"])));
    }

    #[test]
    fn unknown_tags_and_short_records_never_match() {
        let filter = PolicyFilter::new().accept("v9", ["x"]);
        assert!(!filter.matches(&record(&["p", "x"])));

        let filter = PolicyFilter::new().accept("v3", ["x"]);
        assert!(!filter.matches(&record(&["p", "a"])));
    }

    #[test]
    fn filtered_record_match_compares_a_value_slice() {
        let r = record(&["p", "alice", "data", "read"]);
        assert!(filtered_record_match(&r, "p", 0, &record(&["alice"])));
        assert!(filtered_record_match(&r, "p", 1, &record(&["data", "read"])));
        assert!(!filtered_record_match(&r, "p", 1, &record(&["data", "write"])));
        assert!(!filtered_record_match(&r, "g", 0, &record(&["alice"])));
        assert!(filtered_record_match(&r, "p", 0, &[]));
    }
}
