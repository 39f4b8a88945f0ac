//! Read-only CSV file adapter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::adapter::{Adapter, PolicyFilter, PolicyRecord};
use crate::csv;
use crate::{AdapterError, AdapterResult};

/// Adapter over a CSV policy file.
///
/// This is the enforcer's default adapter and is read-only: add and remove
/// succeed without touching the file, so an enforcer can be exercised
/// against a fixture file without mutating it. [`Adapter::save_policies`]
/// is the one write path and rewrites the whole file. Without a backing
/// path, loads fail with [`AdapterError::NoPolicySource`] and every
/// mutation is a successful no-op.
#[derive(Debug, Clone, Default)]
pub struct FileAdapter {
    path: Option<PathBuf>,
}

impl FileAdapter {
    /// Creates an adapter backed by the given CSV file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Creates an adapter with no backing file.
    #[must_use]
    pub fn unbacked() -> Self {
        Self { path: None }
    }

    /// Returns the backing file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn backing_path(&self) -> AdapterResult<&Path> {
        self.path.as_deref().ok_or(AdapterError::NoPolicySource)
    }
}

#[async_trait]
impl Adapter for FileAdapter {
    async fn load_policies(&self) -> AdapterResult<Vec<PolicyRecord>> {
        let path = self.backing_path()?;
        let text = fs::read_to_string(path).await?;
        let records = csv::parse(&text);
        debug!(path = %path.display(), records = records.len(), "policy file loaded");
        Ok(records)
    }

    async fn load_filtered_policies(
        &self,
        filter: &PolicyFilter,
    ) -> AdapterResult<Vec<PolicyRecord>> {
        let mut records = self.load_policies().await?;
        records.retain(|record| filter.matches(record));
        Ok(records)
    }

    async fn add_policy(&mut self, _record: &PolicyRecord) -> AdapterResult<()> {
        Ok(())
    }

    async fn remove_policy(&mut self, _record: &PolicyRecord) -> AdapterResult<()> {
        Ok(())
    }

    async fn remove_filtered_policy(
        &mut self,
        _key: &str,
        _idx: usize,
        _values: &[String],
    ) -> AdapterResult<()> {
        Ok(())
    }

    async fn save_policies(&mut self, records: &[PolicyRecord]) -> AdapterResult<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        fs::write(path, csv::render(records)).await?;
        debug!(path = %path.display(), records = records.len(), "policy file saved");
        Ok(())
    }
}
