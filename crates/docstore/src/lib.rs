//! # estate-docstore
//!
//! Collections of JSON documents addressed by `collection/id`, the database
//! handle migration transforms operate on.
//!
//! Two backends are provided:
//!
//! - [`SqlStore`]: a SQLite database through `sqlx`, used by the CLI
//! - [`MemoryStore`]: an in-process map, used by tests and as an injectable fake
//!
//! Every write path resolves [`server_timestamp()`] sentinels to the store
//! clock, so documents never contain the sentinel once persisted.

pub mod backends;
pub mod batch;
pub mod clock;
pub mod error;
pub mod timestamp;

pub use backends::{MemoryStore, SqlStore};
pub use batch::{WriteBatch, WriteOp};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use timestamp::{
    format_timestamp, is_server_timestamp, parse_timestamp, resolve_server_timestamps,
    server_timestamp,
};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Core document store trait that all backends implement
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` when it does not exist
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Create or replace a document
    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()>;

    /// Delete a document; returns whether it existed
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// All documents of a collection, ordered by id
    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>>;

    /// Apply a batch atomically
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Clock used to resolve server timestamps
    fn clock(&self) -> Arc<dyn Clock>;
}

/// Reject empty segments and segments containing `/`
pub(crate) fn validate_path(collection: &str, id: &str) -> StoreResult<()> {
    for (kind, segment) in [("collection", collection), ("document id", id)] {
        if segment.is_empty() {
            return Err(StoreError::InvalidPath(format!("{} cannot be empty", kind)));
        }
        if segment.contains('/') {
            return Err(StoreError::InvalidPath(format!(
                "{} '{}' cannot contain '/'",
                kind, segment
            )));
        }
    }
    Ok(())
}

/// Check a document body and resolve its timestamp sentinels
pub(crate) fn prepare_document(
    collection: &str,
    id: &str,
    mut data: Value,
    clock: &dyn Clock,
) -> StoreResult<Value> {
    validate_path(collection, id)?;
    if !data.is_object() {
        return Err(StoreError::invalid_document(
            collection,
            id,
            "document body must be a JSON object",
        ));
    }
    resolve_server_timestamps(&mut data, clock.now());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("tags", "parking").is_ok());
        assert!(matches!(
            validate_path("", "parking"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            validate_path("tags", "a/b"),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_prepare_document_rejects_scalars() {
        let result = prepare_document("tags", "parking", json!("parking"), &SystemClock);
        assert!(matches!(result, Err(StoreError::InvalidDocument { .. })));
    }
}
