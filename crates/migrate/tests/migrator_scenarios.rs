//! End-to-end migrator runs against in-memory and SQLite stores

use async_trait::async_trait;
use estate_docstore::{
    Clock, DocumentStore, MemoryStore, SqlStore, StoreError, StoreResult, SystemClock, WriteBatch,
};
use estate_migrate::{
    Direction, DocumentVersionStore, HistoryEntry, MigrationContext, MigrationDescriptor,
    MigrationError, MigrationRegistry, MigrationResult, Migrator, VersionRecord, VersionStore,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

const COLLECTION: &str = "migration_versions";

/// Shared record of which transforms ran, in order
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

struct AddTag {
    id: &'static str,
    journal: Journal,
}

struct RemoveTag {
    id: &'static str,
    journal: Journal,
}

struct Broken;

#[async_trait]
impl estate_migrate::Transform for AddTag {
    async fn run(&self, db: &dyn DocumentStore, ctx: &MigrationContext) -> anyhow::Result<()> {
        self.journal.0.lock().push(format!("up:{}", self.id));
        db.set(
            "tags",
            self.id,
            json!({ "name": self.id, "createdAt": ctx.timestamp.clone() }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl estate_migrate::Transform for RemoveTag {
    async fn run(&self, db: &dyn DocumentStore, _ctx: &MigrationContext) -> anyhow::Result<()> {
        self.journal.0.lock().push(format!("down:{}", self.id));
        db.delete("tags", self.id).await?;
        Ok(())
    }
}

#[async_trait]
impl estate_migrate::Transform for Broken {
    async fn run(&self, _db: &dyn DocumentStore, _ctx: &MigrationContext) -> anyhow::Result<()> {
        anyhow::bail!("index build rejected")
    }
}

fn tag(version: u32, id: &'static str, journal: &Journal) -> MigrationDescriptor {
    MigrationDescriptor::new(
        version,
        id,
        AddTag {
            id,
            journal: journal.clone(),
        },
    )
    .with_description(format!("Add {} tag", id))
    .with_down(RemoveTag {
        id,
        journal: journal.clone(),
    })
}

fn memory_migrator(descriptors: Vec<MigrationDescriptor>) -> (Arc<MemoryStore>, Migrator) {
    let store = Arc::new(MemoryStore::new());
    let versions = Arc::new(DocumentVersionStore::new(store.clone(), COLLECTION));
    let registry = MigrationRegistry::from_descriptors(descriptors).unwrap();
    (store.clone(), Migrator::new(registry, store, versions))
}

#[tokio::test]
async fn migrate_from_empty_applies_everything() {
    let journal = Journal::default();
    let (store, migrator) = memory_migrator(vec![
        tag(1, "parking", &journal),
        tag(2, "elevator", &journal),
        tag(3, "terrace", &journal),
    ]);

    let outcome = migrator.migrate().await;

    assert!(outcome.is_success());
    assert_eq!(outcome.from, 0);
    assert_eq!(outcome.reached, 3);
    assert_eq!(migrator.current_version().await, 3);

    let report = migrator.status().await;
    assert_eq!(report.history.len(), 3);
    assert!(report.pending.is_empty());
    assert_eq!(store.count("tags"), 3);
}

#[tokio::test]
async fn migrate_twice_is_idempotent() {
    let journal = Journal::default();
    let (_store, migrator) =
        memory_migrator(vec![tag(1, "parking", &journal), tag(2, "elevator", &journal)]);

    migrator.migrate().await.into_result().unwrap();
    let second = migrator.migrate().await;

    assert!(second.is_noop());
    assert_eq!(migrator.current_version().await, 2);
    assert_eq!(journal.entries(), vec!["up:parking", "up:elevator"]);
}

#[tokio::test]
async fn registration_order_does_not_affect_execution_order() {
    let journal = Journal::default();
    let (_store, migrator) = memory_migrator(vec![
        tag(1, "parking", &journal),
        tag(3, "terrace", &journal),
        tag(2, "elevator", &journal),
    ]);

    let outcome = migrator.migrate().await;

    assert_eq!(outcome.steps, vec![1, 2, 3]);
    assert_eq!(
        journal.entries(),
        vec!["up:parking", "up:elevator", "up:terrace"]
    );
}

#[tokio::test]
async fn failing_migration_stops_the_run() {
    let journal = Journal::default();
    let (store, migrator) = memory_migrator(vec![
        tag(1, "parking", &journal),
        tag(2, "elevator", &journal),
        MigrationDescriptor::new(3, "reindex", Broken),
        tag(4, "terrace", &journal),
    ]);

    let outcome = migrator.migrate().await;

    assert!(matches!(
        outcome.error,
        Some(MigrationError::Transform { version: 3, .. })
    ));
    assert_eq!(outcome.reached, 2);
    assert_eq!(migrator.current_version().await, 2);
    assert!(store.get(COLLECTION, "v3").await.unwrap().is_none());
    assert!(!journal.entries().contains(&"up:terrace".to_string()));
}

#[tokio::test]
async fn default_rollback_steps_back_one_version() {
    let journal = Journal::default();
    let (store, migrator) =
        memory_migrator(vec![tag(1, "parking", &journal), tag(2, "elevator", &journal)]);
    migrator.migrate().await.into_result().unwrap();

    let outcome = migrator.rollback(None).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.steps, vec![2]);
    assert_eq!(migrator.current_version().await, 1);
    assert!(store.get("tags", "elevator").await.unwrap().is_none());
    assert!(store.get("tags", "parking").await.unwrap().is_some());
}

#[tokio::test]
async fn rollback_without_down_leaves_version_unchanged() {
    let journal = Journal::default();
    let (_store, migrator) = memory_migrator(vec![
        tag(1, "parking", &journal),
        MigrationDescriptor::new(
            2,
            "elevator",
            AddTag {
                id: "elevator",
                journal: journal.clone(),
            },
        ),
    ]);
    migrator.migrate().await.into_result().unwrap();

    let outcome = migrator.rollback(None).await;

    assert!(matches!(
        outcome.error,
        Some(MigrationError::MissingDown { version: 2 })
    ));
    assert_eq!(migrator.current_version().await, 2);
}

#[tokio::test]
async fn rollback_to_current_or_above_is_a_noop() {
    let journal = Journal::default();
    let (_store, migrator) =
        memory_migrator(vec![tag(1, "parking", &journal), tag(2, "elevator", &journal)]);
    migrator.migrate().await.into_result().unwrap();

    for target in [2, 7] {
        let outcome = migrator.rollback(Some(target)).await;
        assert!(outcome.is_noop());
    }
    assert_eq!(migrator.current_version().await, 2);
    assert!(!journal.entries().iter().any(|e| e.starts_with("down:")));
}

#[tokio::test]
async fn negative_rollback_target_is_rejected() {
    let journal = Journal::default();
    let (store, migrator) = memory_migrator(vec![tag(1, "parking", &journal)]);
    migrator.migrate().await.into_result().unwrap();
    let before = store.list(COLLECTION).await.unwrap();

    let outcome = migrator.rollback(Some(-1)).await;

    assert!(matches!(
        outcome.error,
        Some(MigrationError::NegativeTarget { target: -1 })
    ));
    assert_eq!(store.list(COLLECTION).await.unwrap(), before);
    assert_eq!(migrator.current_version().await, 1);
}

/// Version store whose reads always fail
struct UnreachableVersions;

#[async_trait]
impl VersionStore for UnreachableVersions {
    async fn current(&self) -> MigrationResult<Option<VersionRecord>> {
        Err(StoreError::Unavailable("connection refused".into()).into())
    }

    async fn record(&self, _version: u32, _name: &str, _description: &str) -> MigrationResult<()> {
        Err(StoreError::Unavailable("connection refused".into()).into())
    }

    async fn history(&self, _up_to: u32) -> MigrationResult<Vec<HistoryEntry>> {
        Err(StoreError::Unavailable("connection refused".into()).into())
    }
}

#[tokio::test]
async fn status_soft_fails_when_bookkeeping_is_unreachable() {
    let journal = Journal::default();
    let registry = MigrationRegistry::from_descriptors(vec![tag(1, "parking", &journal)]).unwrap();
    let migrator = Migrator::new(
        registry,
        Arc::new(MemoryStore::new()),
        Arc::new(UnreachableVersions),
    );

    let report = migrator.status().await;

    assert_eq!(report.current, 0);
    assert_eq!(report.pending.len(), 1);
    assert!(report.history.is_empty());
    assert!(report.history_error.is_some());
}

/// Document store that accepts nothing
struct OfflineStore;

#[async_trait]
impl DocumentStore for OfflineStore {
    async fn get(&self, _collection: &str, _id: &str) -> StoreResult<Option<Value>> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn set(&self, _collection: &str, _id: &str, _data: Value) -> StoreResult<()> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn delete(&self, _collection: &str, _id: &str) -> StoreResult<bool> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn list(&self, _collection: &str) -> StoreResult<Vec<(String, Value)>> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn commit(&self, _batch: WriteBatch) -> StoreResult<()> {
        Err(StoreError::Unavailable("offline".into()))
    }

    fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(SystemClock)
    }
}

#[tokio::test]
async fn migrate_against_offline_store_reports_transform_failure() {
    let journal = Journal::default();
    let store: Arc<dyn DocumentStore> = Arc::new(OfflineStore);
    let versions = Arc::new(DocumentVersionStore::new(store.clone(), COLLECTION));
    let registry = MigrationRegistry::from_descriptors(vec![tag(1, "parking", &journal)]).unwrap();
    let migrator = Migrator::new(registry, store, versions);

    let outcome = migrator.migrate().await;

    assert_eq!(outcome.from, 0);
    assert!(matches!(
        outcome.error,
        Some(MigrationError::Transform { version: 1, .. })
    ));
    assert!(outcome.steps.is_empty());
}

/// Delegates to a real version store but refuses to record one version
struct RejectingVersions {
    inner: DocumentVersionStore,
    reject: u32,
}

#[async_trait]
impl VersionStore for RejectingVersions {
    async fn current(&self) -> MigrationResult<Option<VersionRecord>> {
        self.inner.current().await
    }

    async fn record(&self, version: u32, name: &str, description: &str) -> MigrationResult<()> {
        if version == self.reject {
            return Err(StoreError::Unavailable("disk".into()).into());
        }
        self.inner.record(version, name, description).await
    }

    async fn history(&self, up_to: u32) -> MigrationResult<Vec<HistoryEntry>> {
        self.inner.history(up_to).await
    }
}

#[tokio::test]
async fn bookkeeping_failure_stops_after_the_transform() {
    let journal = Journal::default();
    let store = Arc::new(MemoryStore::new());
    let versions = Arc::new(RejectingVersions {
        inner: DocumentVersionStore::new(store.clone(), COLLECTION),
        reject: 2,
    });
    let registry = MigrationRegistry::from_descriptors(vec![
        tag(1, "parking", &journal),
        tag(2, "elevator", &journal),
        tag(3, "terrace", &journal),
    ])
    .unwrap();
    let migrator = Migrator::new(registry, store.clone(), versions);

    let outcome = migrator.migrate().await;

    assert!(matches!(outcome.error, Some(MigrationError::Bookkeeping(_))));
    assert_eq!(outcome.reached, 1);
    assert_eq!(outcome.steps, vec![1]);
    assert_eq!(migrator.current_version().await, 1);
    assert!(!journal.entries().contains(&"up:terrace".to_string()));
}

struct RefuseDown;

#[async_trait]
impl estate_migrate::Transform for RefuseDown {
    async fn run(&self, _db: &dyn DocumentStore, _ctx: &MigrationContext) -> anyhow::Result<()> {
        anyhow::bail!("tags still referenced by listings")
    }
}

#[tokio::test]
async fn failing_down_stops_the_rollback() {
    let journal = Journal::default();
    let (_store, migrator) = memory_migrator(vec![
        tag(1, "parking", &journal),
        MigrationDescriptor::new(
            2,
            "elevator",
            AddTag {
                id: "elevator",
                journal: journal.clone(),
            },
        )
        .with_down(RefuseDown),
        tag(3, "terrace", &journal),
    ]);
    migrator.migrate().await.into_result().unwrap();

    let outcome = migrator.rollback(Some(0)).await;

    assert!(matches!(
        outcome.error,
        Some(MigrationError::Transform {
            version: 2,
            direction: Direction::Down,
            ..
        })
    ));
    assert_eq!(outcome.steps, vec![3]);
    assert_eq!(outcome.reached, 2);
    assert_eq!(migrator.current_version().await, 2);
    assert!(!journal.entries().contains(&"down:parking".to_string()));
}

#[tokio::test]
async fn sqlite_round_trip_persists_bookkeeping() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", temp_dir.path().join("estate.db").display());
    let journal = Journal::default();

    {
        let store = Arc::new(SqlStore::connect(&url).await.unwrap());
        let versions = Arc::new(DocumentVersionStore::new(store.clone(), COLLECTION));
        let registry = MigrationRegistry::from_descriptors(vec![
            tag(1, "parking", &journal),
            tag(2, "elevator", &journal),
        ])
        .unwrap();
        let migrator = Migrator::new(registry, store.clone(), versions);
        migrator.migrate().await.into_result().unwrap();
        store.close().await;
    }

    let store = Arc::new(SqlStore::connect(&url).await.unwrap());
    let versions = DocumentVersionStore::new(store.clone(), COLLECTION);

    let current = versions.current().await.unwrap().unwrap();
    assert_eq!(current.version, 2);
    assert!(current.updated_at.is_some());

    let history = versions.history(current.version).await.unwrap();
    let names: Vec<&str> = history.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["elevator", "parking"]);
    assert_eq!(history[1].description, "Add parking tag");
}
