use estate_core::MigrateConfig;
use estate_docstore::{DocumentStore, SqlStore};
use estate_migrate::{DocumentVersionStore, Migrator, RunOutcome};
use std::sync::Arc;

use crate::error::CliError;
use crate::versions;

pub const HELP: &str = "
Estate Document Store Migration Tool

Usage:
  estate-migrate <command> [options]

Commands:
  migrate                 Run all pending migrations
  rollback [version]      Roll back to a specific version (defaults to previous version)
  status                  Show current migration status
  create <name>           Create a new migration file
  help                    Show this help message

Examples:
  estate-migrate migrate
  estate-migrate rollback 5
  estate-migrate status
  estate-migrate create \"add user roles\"
";

/// Open the configured database and wire up the built-in migrations
pub async fn connect(config: &MigrateConfig) -> Result<Migrator, CliError> {
    let store: Arc<dyn DocumentStore> = Arc::new(SqlStore::connect(&config.database_url).await?);
    migrator(store, config)
}

/// Build a migrator for `store` using the configured collection and directory
pub fn migrator(
    store: Arc<dyn DocumentStore>,
    config: &MigrateConfig,
) -> Result<Migrator, CliError> {
    let versions = Arc::new(DocumentVersionStore::new(
        store.clone(),
        config.collection.as_str(),
    ));
    let migrator = Migrator::new(versions::registry()?, store, versions)
        .with_migrations_dir(&config.migrations_dir);
    Ok(migrator)
}

pub async fn run(migrator: &Migrator) -> Result<(), CliError> {
    finish(migrator.migrate().await)
}

pub async fn rollback(migrator: &Migrator, version: Option<i64>) -> Result<(), CliError> {
    finish(migrator.rollback(version).await)
}

pub async fn status(migrator: &Migrator) -> Result<(), CliError> {
    print!("{}", migrator.status().await);
    Ok(())
}

pub fn create(migrator: &Migrator, name: Option<&str>) -> Result<(), CliError> {
    let path = migrator.create(name)?;
    println!("Created migration file: {}", path.display());
    println!("Register it in the versions module to include it in the next run.");
    Ok(())
}

pub fn help() {
    println!("{}", HELP);
}

fn finish(outcome: RunOutcome) -> Result<(), CliError> {
    outcome.into_result()?;
    Ok(())
}
