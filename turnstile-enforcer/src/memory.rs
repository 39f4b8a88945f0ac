//! In-memory adapter.

use async_trait::async_trait;

use crate::AdapterResult;
use crate::adapter::{Adapter, PolicyFilter, PolicyRecord, filtered_record_match};

/// Adapter holding records in memory.
///
/// Useful for tests and for programmatic policy management where the
/// enforcer's in-memory set is the source of truth. Duplicate detection is
/// the enforcer's concern; the adapter stores what it is told.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    records: Vec<PolicyRecord>,
}

impl MemoryAdapter {
    /// Creates an empty adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an adapter pre-seeded with records.
    #[must_use]
    pub fn with_records(records: Vec<PolicyRecord>) -> Self {
        Self { records }
    }

    /// Returns the stored records.
    #[must_use]
    pub fn records(&self) -> &[PolicyRecord] {
        &self.records
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn load_policies(&self) -> AdapterResult<Vec<PolicyRecord>> {
        Ok(self.records.clone())
    }

    async fn load_filtered_policies(
        &self,
        filter: &PolicyFilter,
    ) -> AdapterResult<Vec<PolicyRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn add_policy(&mut self, record: &PolicyRecord) -> AdapterResult<()> {
        self.records.push(record.clone());
        Ok(())
    }

    async fn remove_policy(&mut self, record: &PolicyRecord) -> AdapterResult<()> {
        self.records.retain(|stored| stored != record);
        Ok(())
    }

    async fn remove_filtered_policy(
        &mut self,
        key: &str,
        idx: usize,
        values: &[String],
    ) -> AdapterResult<()> {
        self.records
            .retain(|record| !filtered_record_match(record, key, idx, values));
        Ok(())
    }

    async fn save_policies(&mut self, records: &[PolicyRecord]) -> AdapterResult<()> {
        self.records = records.to_vec();
        Ok(())
    }
}
