//! Atomic write batches

use serde_json::Value;

/// A single buffered write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Writes committed together with [`DocumentStore::commit`](crate::DocumentStore::commit).
///
/// Either every operation is applied, in order, or none is.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a create-or-replace of `collection/id`
    pub fn set(&mut self, collection: &str, id: &str, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    /// Queue a delete of `collection/id`
    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ops_keep_queue_order() {
        let mut batch = WriteBatch::new();
        batch
            .set("tags", "park", json!({ "category": "location" }))
            .delete("tags", "park");

        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.ops()[1],
            WriteOp::Delete {
                collection: "tags".to_string(),
                id: "park".to_string(),
            }
        );
    }
}
