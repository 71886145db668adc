//! Built-in migrations
//!
//! Each `NNN_name.rs` file exposes `migration()`; add new files here with a
//! `#[path]` module and an entry in [`registry`].

use estate_migrate::{MigrationRegistry, MigrationResult};

#[path = "001_initial_schema.rs"]
mod initial_schema;

/// Every built-in migration, keyed by version
pub fn registry() -> MigrationResult<MigrationRegistry> {
    MigrationRegistry::from_descriptors([initial_schema::migration()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_registry_matches_files_on_disk() {
        let registry = registry().unwrap();
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/versions");
        let files = estate_migrate::scan_migration_files(&dir).unwrap();

        assert_eq!(registry.len(), files.len());
        for file in files {
            let migration = registry.get(file.version).unwrap();
            assert_eq!(migration.file_name.as_deref(), Some(file.file_name.as_str()));
            assert_eq!(migration.name, file.name);
        }
    }
}
