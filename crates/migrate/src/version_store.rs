//! Version bookkeeping in the control collection

use async_trait::async_trait;
use estate_docstore::{server_timestamp, DocumentStore, WriteBatch};
use serde_json::json;
use std::sync::Arc;

use crate::definitions::{HistoryEntry, VersionRecord};
use crate::error::{MigrationError, MigrationResult};

/// Id of the singleton version document
pub const CURRENT_DOC_ID: &str = "current";

/// Persistence of the applied version and its history
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// The `current` record, `None` before the first migration
    async fn current(&self) -> MigrationResult<Option<VersionRecord>>;

    /// Set `current` to `version` and write the `v{version}` history entry,
    /// atomically
    async fn record(&self, version: u32, name: &str, description: &str) -> MigrationResult<()>;

    /// History entries with `version <= up_to`, descending by version
    async fn history(&self, up_to: u32) -> MigrationResult<Vec<HistoryEntry>>;
}

/// [`VersionStore`] kept as documents of a [`DocumentStore`] collection
#[derive(Clone)]
pub struct DocumentVersionStore {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl DocumentVersionStore {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    fn history_id(version: u32) -> String {
        format!("v{}", version)
    }
}

#[async_trait]
impl VersionStore for DocumentVersionStore {
    async fn current(&self) -> MigrationResult<Option<VersionRecord>> {
        let Some(doc) = self.store.get(&self.collection, CURRENT_DOC_ID).await? else {
            return Ok(None);
        };
        let record = serde_json::from_value(doc).map_err(MigrationError::corrupt_record)?;
        Ok(Some(record))
    }

    async fn record(&self, version: u32, name: &str, description: &str) -> MigrationResult<()> {
        let mut batch = WriteBatch::new();
        batch
            .set(
                &self.collection,
                CURRENT_DOC_ID,
                json!({
                    "version": version,
                    "updatedAt": server_timestamp(),
                }),
            )
            .set(
                &self.collection,
                &Self::history_id(version),
                json!({
                    "version": version,
                    "name": name,
                    "description": description,
                    "appliedAt": server_timestamp(),
                }),
            );

        self.store.commit(batch).await?;
        tracing::info!(version, collection = %self.collection, "Updated version to {}", version);
        Ok(())
    }

    async fn history(&self, up_to: u32) -> MigrationResult<Vec<HistoryEntry>> {
        let documents = self.store.list(&self.collection).await?;

        let mut entries = Vec::new();
        for (id, doc) in documents {
            if id == CURRENT_DOC_ID || !id.starts_with('v') {
                continue;
            }
            let entry: HistoryEntry =
                serde_json::from_value(doc).map_err(MigrationError::corrupt_record)?;
            if entry.version <= up_to {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(entries)
    }
}
