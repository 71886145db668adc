//! Migration: initial schema
//!
//! Seeds the administrator account and the property tag catalogue.

use async_trait::async_trait;
use estate_docstore::{DocumentStore, WriteBatch};
use estate_migrate::{MigrationContext, MigrationDescriptor, Transform};
use serde_json::json;

pub const VERSION: u32 = 1;
pub const NAME: &str = "initial_schema";

const ADMIN_ID: &str = "admin";

/// (id, display name, category)
const STATUS_TAGS: &[(&str, &str, &str)] = &[
    ("available", "공실", "status"),
    ("underContract", "계약중", "status"),
    ("rented", "임대완료", "status"),
];

const FEATURE_TAGS: &[(&str, &str, &str)] = &[
    ("parking", "주차가능", "feature"),
    ("elevator", "엘리베이터", "feature"),
    ("security", "보안시설", "feature"),
    ("subway", "역세권", "location"),
    ("university", "대학가", "location"),
    ("park", "공원근처", "location"),
    ("pet", "애완동물가능", "condition"),
    ("furnished", "가구완비", "condition"),
    ("new", "신축", "condition"),
];

pub fn migration() -> MigrationDescriptor {
    MigrationDescriptor::new(VERSION, NAME, Up)
        .with_description("Create initial schema for the property management system")
        .with_down(Down)
        .with_file_name("001_initial_schema.rs")
}

struct Up;

#[async_trait]
impl Transform for Up {
    async fn run(&self, db: &dyn DocumentStore, ctx: &MigrationContext) -> anyhow::Result<()> {
        tracing::info!("Applying migration {}: {}", VERSION, NAME);

        db.set(
            "users",
            ADMIN_ID,
            json!({
                "email": "admin@property-app.com",
                "displayName": "System Administrator",
                "role": "admin",
                "emailVerified": true,
                "createdAt": ctx.timestamp.clone(),
                "updatedAt": ctx.timestamp.clone(),
            }),
        )
        .await?;

        let mut batch = WriteBatch::new();
        for (id, name, category) in STATUS_TAGS.iter().chain(FEATURE_TAGS) {
            batch.set(
                "tags",
                id,
                json!({
                    "id": id,
                    "name": name,
                    "category": category,
                    "createdAt": ctx.timestamp.clone(),
                }),
            );
        }
        db.commit(batch).await?;

        tracing::info!("Initial schema creation complete");
        Ok(())
    }
}

struct Down;

#[async_trait]
impl Transform for Down {
    async fn run(&self, db: &dyn DocumentStore, _ctx: &MigrationContext) -> anyhow::Result<()> {
        tracing::info!("Rolling back migration {}: {}", VERSION, NAME);

        let tags = db.list("tags").await?;
        if !tags.is_empty() {
            let mut batch = WriteBatch::new();
            for (id, _) in &tags {
                batch.delete("tags", id);
            }
            db.commit(batch).await?;
            tracing::info!("Deleted {} tags", tags.len());
        }

        // A failed admin delete does not fail the rollback.
        match db.delete("users", ADMIN_ID).await {
            Ok(_) => tracing::info!("Deleted admin user"),
            Err(e) => tracing::error!("Error deleting admin user: {}", e),
        }

        tracing::info!("Rollback complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_docstore::MemoryStore;
    use estate_docstore::{Clock, SystemClock};
    use std::sync::Arc;

    fn context() -> MigrationContext {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        MigrationContext::new(clock)
    }

    #[tokio::test]
    async fn test_up_seeds_admin_and_tags() {
        let store = MemoryStore::new();

        migration().up().run(&store, &context()).await.unwrap();

        let admin = store.get("users", "admin").await.unwrap().unwrap();
        assert_eq!(admin["role"], "admin");
        assert!(admin["createdAt"].is_string());

        assert_eq!(store.count("tags"), 12);
        let rented = store.get("tags", "rented").await.unwrap().unwrap();
        assert_eq!(rented["category"], "status");
        assert_eq!(rented["name"], "임대완료");
    }

    #[tokio::test]
    async fn test_down_removes_everything_up_created() {
        let store = MemoryStore::new();
        let migration = migration();

        migration.up().run(&store, &context()).await.unwrap();
        migration.down().unwrap().run(&store, &context()).await.unwrap();

        assert_eq!(store.count("tags"), 0);
        assert!(store.get("users", "admin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_down_on_empty_database_succeeds() {
        let store = MemoryStore::new();
        let result = migration().down().unwrap().run(&store, &context()).await;
        assert!(result.is_ok());
    }
}
