//! SQLite document store backend
//!
//! Documents live in a single `documents` table keyed by `(collection, id)`,
//! with the body stored as JSON text.

use crate::{
    format_timestamp, prepare_document, validate_path, Clock, DocumentStore, StoreResult,
    SystemClock, WriteBatch, WriteOp,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Row};
use std::str::FromStr;
use std::sync::Arc;

const CREATE_DOCUMENTS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS documents (\n    \
        collection TEXT NOT NULL,\n    \
        id TEXT NOT NULL,\n    \
        data TEXT NOT NULL,\n    \
        updated_at TEXT NOT NULL,\n    \
        PRIMARY KEY (collection, id)\n\
    )";

const UPSERT_DOCUMENT_SQL: &str = "INSERT INTO documents (collection, id, data, updated_at) \
     VALUES (?1, ?2, ?3, ?4) \
     ON CONFLICT (collection, id) \
     DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at";

const DELETE_DOCUMENT_SQL: &str = "DELETE FROM documents WHERE collection = ?1 AND id = ?2";

/// Document store on a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqlStore {
    /// Connect to `database_url`, creating the database file and the
    /// documents table when missing
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool_options = pool_options(database_url);
        let max_connections = pool_options.get_max_connections();

        let pool = pool_options.connect_with(options).await?;

        tracing::debug!(url = database_url, max_connections, "connected document store");

        Self::from_pool(pool, Arc::new(SystemClock)).await
    }

    /// Wrap an existing pool, ensuring the documents table exists
    pub async fn from_pool(pool: SqlitePool, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        sqlx::query(CREATE_DOCUMENTS_TABLE_SQL)
            .execute(&pool)
            .await?;
        Ok(Self { pool, clock })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn write_op<'e, E>(executor: E, op: &WriteOp, stamped_at: &str) -> StoreResult<u64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = match op {
            WriteOp::Set {
                collection,
                id,
                data,
            } => {
                let body = serde_json::to_string(data)?;
                sqlx::query(UPSERT_DOCUMENT_SQL)
                    .bind(collection)
                    .bind(id)
                    .bind(body)
                    .bind(stamped_at)
                    .execute(executor)
                    .await?
            }
            WriteOp::Delete { collection, id } => {
                sqlx::query(DELETE_DOCUMENT_SQL)
                    .bind(collection)
                    .bind(id)
                    .execute(executor)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }
}

/// Every connection to an in-memory database sees its own empty database,
/// and the data is gone once that connection closes. Such pools hold exactly
/// one connection that is never recycled.
fn pool_options(database_url: &str) -> SqlitePoolOptions {
    if is_in_memory(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn decode_body(raw: &str) -> StoreResult<Value> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl DocumentStore for SqlStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        validate_path(collection, id)?;

        let row = sqlx::query("SELECT data FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("data")?;
                Ok(Some(decode_body(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        let data = prepare_document(collection, id, data, self.clock.as_ref())?;
        let stamped_at = format_timestamp(self.clock.now());
        let op = WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        };
        Self::write_op(&self.pool, &op, &stamped_at).await?;
        tracing::debug!(collection, id, "document written");
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        validate_path(collection, id)?;
        let op = WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let affected = Self::write_op(&self.pool, &op, "").await?;
        Ok(affected > 0)
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ?1 ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let raw: String = row.try_get("data")?;
            documents.push((id, decode_body(&raw)?));
        }
        Ok(documents)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let stamped_at = format_timestamp(self.clock.now());
        let mut prepared = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            let op = match op {
                WriteOp::Set {
                    collection,
                    id,
                    data,
                } => {
                    let data = prepare_document(&collection, &id, data, self.clock.as_ref())?;
                    WriteOp::Set {
                        collection,
                        id,
                        data,
                    }
                }
                WriteOp::Delete { collection, id } => {
                    validate_path(&collection, &id)?;
                    WriteOp::Delete { collection, id }
                }
            };
            prepared.push(op);
        }

        let mut transaction = self.pool.begin().await?;
        for op in &prepared {
            Self::write_op(&mut *transaction, op, &stamped_at).await?;
        }
        transaction.commit().await?;

        tracing::debug!(operations = prepared.len(), "batch committed");
        Ok(())
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}
