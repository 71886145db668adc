//! # estate-migrate
//!
//! Versioned data migrations for the estate document store.
//!
//! Migrations are registered statically in a [`MigrationRegistry`]; each one
//! is a [`MigrationDescriptor`] carrying a version, a name, an `up`
//! [`Transform`] and an optional `down`. The [`Migrator`] applies pending
//! versions in ascending order, rolls back in descending order, and records
//! progress through a [`VersionStore`]:
//!
//! - `current`: `{ version, updatedAt }`
//! - `v{version}`: `{ version, name, description, appliedAt }`
//!
//! Every run returns a [`RunOutcome`] instead of exiting, so the CLI decides
//! the process exit code and tests can inspect partial progress.

pub mod definitions;
pub mod error;
pub mod loader;
pub mod migrator;
pub mod registry;
pub mod rollback;
pub mod scaffold;
pub mod version_store;

pub use definitions::{
    Direction, HistoryEntry, MigrationContext, MigrationDescriptor, PendingMigration,
    RunOutcome, StatusReport, Transform, VersionRecord,
};
pub use error::{MigrationError, MigrationResult};
pub use loader::{scan_migration_files, MigrationFile};
pub use migrator::Migrator;
pub use registry::MigrationRegistry;
pub use scaffold::MigrationScaffolder;
pub use version_store::{DocumentVersionStore, VersionStore, CURRENT_DOC_ID};
