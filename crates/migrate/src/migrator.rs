//! Migrator - applies registered migrations and reports status
//!
//! The migrator is the only writer of the version bookkeeping. It assumes it
//! is the only runner against the database; no lock is taken.

use estate_docstore::DocumentStore;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::definitions::{Direction, MigrationContext, PendingMigration, RunOutcome, StatusReport};
use crate::error::{MigrationError, MigrationResult};
use crate::loader::scan_migration_files;
use crate::registry::MigrationRegistry;
use crate::scaffold::MigrationScaffolder;
use crate::version_store::VersionStore;

pub struct Migrator {
    registry: MigrationRegistry,
    db: Arc<dyn DocumentStore>,
    versions: Arc<dyn VersionStore>,
    migrations_dir: Option<PathBuf>,
}

impl Migrator {
    /// Create a migrator over `db`, recording progress in `versions`
    pub fn new(
        registry: MigrationRegistry,
        db: Arc<dyn DocumentStore>,
        versions: Arc<dyn VersionStore>,
    ) -> Self {
        tracing::info!("Found {} registered migrations", registry.len());
        Self {
            registry,
            db,
            versions,
            migrations_dir: None,
        }
    }

    /// Directory holding the `NNN_name.rs` source files
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = Some(dir.into());
        self
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub(crate) fn db(&self) -> &dyn DocumentStore {
        self.db.as_ref()
    }

    pub(crate) fn versions(&self) -> &dyn VersionStore {
        self.versions.as_ref()
    }

    pub(crate) fn context(&self) -> MigrationContext {
        MigrationContext::new(self.db.clock())
    }

    /// Currently applied version.
    ///
    /// Returns 0 when nothing has been recorded yet, and also when the
    /// record cannot be read; the read error is logged rather than returned.
    pub async fn current_version(&self) -> u32 {
        match self.versions.current().await {
            Ok(Some(record)) => record.version,
            Ok(None) => 0,
            Err(e) => {
                tracing::error!("Error getting current version: {}", e);
                0
            }
        }
    }

    /// Apply every registered migration above the current version, in
    /// ascending order, stopping at the first failure
    pub async fn migrate(&self) -> RunOutcome {
        tracing::info!("Starting migration...");

        let current = self.current_version().await;
        tracing::info!("Current database version: {}", current);

        let mut outcome = RunOutcome::start(Direction::Up, current);
        let pending = self.registry.pending(current);
        tracing::info!("Found {} pending migrations", pending.len());

        if pending.is_empty() {
            tracing::info!("Database is already up to date.");
            return outcome;
        }

        let ctx = self.context();

        for migration in pending {
            tracing::info!("Running migration {}: {}", migration.version, migration.name);

            if let Err(e) = migration.up().run(self.db(), &ctx).await {
                let error =
                    MigrationError::transform(migration.version, &migration.name, Direction::Up, e);
                tracing::error!("{}", error);
                return outcome.failed(error);
            }

            if let Err(error) = self
                .versions
                .record(migration.version, &migration.name, &migration.description)
                .await
            {
                tracing::error!(
                    "Error applying migration {}: {}",
                    migration.version,
                    error
                );
                return outcome.failed(error);
            }

            outcome.reached = migration.version;
            outcome.steps.push(migration.version);
            tracing::info!("Successfully applied migration {}", migration.version);
        }

        tracing::info!("Migration completed successfully");
        outcome
    }

    /// Current version, pending migrations and applied history.
    ///
    /// History and file-scan failures are logged and reported, never fatal.
    pub async fn status(&self) -> StatusReport {
        let current = self.current_version().await;

        let pending: Vec<PendingMigration> = self
            .registry
            .pending(current)
            .into_iter()
            .map(PendingMigration::from)
            .collect();

        let (history, history_error) = match self.versions.history(current).await {
            Ok(history) => (history, None),
            Err(e) => {
                tracing::error!("Error getting migration history: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        StatusReport {
            current,
            pending,
            history,
            history_error,
            unregistered_files: self.unregistered_files(),
        }
    }

    /// Scaffold a new migration file named after `name`.
    ///
    /// The new version is one above both the highest registered version and
    /// the highest file prefix on disk.
    pub fn create(&self, name: Option<&str>) -> MigrationResult<PathBuf> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(MigrationError::MissingName)?;

        let dir = self
            .migrations_dir
            .clone()
            .ok_or_else(|| MigrationError::Load("No migrations directory configured".into()))?;

        let on_disk = if dir.is_dir() {
            scan_migration_files(&dir)?
                .iter()
                .map(|f| f.version)
                .max()
                .unwrap_or(0)
        } else {
            0
        };
        let latest = self.registry.max_version().max(on_disk);

        MigrationScaffolder::new(dir).create(name, latest)
    }

    fn unregistered_files(&self) -> Vec<String> {
        let Some(dir) = &self.migrations_dir else {
            return Vec::new();
        };

        let files = match scan_migration_files(dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Skipping migration file check: {}", e);
                return Vec::new();
            }
        };

        let registered: HashSet<&str> = self
            .registry
            .iter()
            .filter_map(|m| m.file_name.as_deref())
            .collect();

        for migration in self.registry.iter() {
            if let Some(file_name) = &migration.file_name {
                if !files.iter().any(|f| &f.file_name == file_name) {
                    tracing::warn!(
                        "Migration {} is registered but {} is missing from {}",
                        migration.version,
                        file_name,
                        dir.display()
                    );
                }
            }
        }

        files
            .into_iter()
            .filter(|f| !registered.contains(f.file_name.as_str()))
            .map(|f| f.file_name)
            .collect()
    }
}
