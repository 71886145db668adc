//! In-memory document store

use crate::{prepare_document, validate_path, Clock, DocumentStore, StoreResult, SystemClock};
use crate::{WriteBatch, WriteOp};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// Document store held entirely in process memory
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store stamped by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |docs| docs.len())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        validate_path(collection, id)?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        let data = prepare_document(collection, id, data, self.clock.as_ref())?;
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        validate_path(collection, id)?;
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| (id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        // Validate the whole batch before touching the map.
        let mut prepared = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    data,
                } => {
                    let data = prepare_document(&collection, &id, data, self.clock.as_ref())?;
                    prepared.push(WriteOp::Set {
                        collection,
                        id,
                        data,
                    });
                }
                WriteOp::Delete { collection, id } => {
                    validate_path(&collection, &id)?;
                    prepared.push(WriteOp::Delete { collection, id });
                }
            }
        }

        let mut collections = self.collections.write();
        for op in prepared {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    data,
                } => {
                    collections.entry(collection).or_default().insert(id, data);
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(docs) = collections.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}
