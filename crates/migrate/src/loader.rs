//! Migration file discovery
//!
//! Scans the versions directory for `NNN_name.rs` files. Descriptors are
//! never loaded from these files at runtime; the scan only feeds version
//! numbering for `create` and the registered/on-disk comparison in `status`.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrationError, MigrationResult};

pub const MIGRATION_FILE_PATTERN: &str = r"^(\d{3})_(.*)\.rs$";

/// A migration source file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub file_name: String,
    pub version: u32,
    pub name: String,
    pub path: PathBuf,
}

/// List migration files in `dir` (non-recursive), sorted by file name.
///
/// A missing directory or an unreadable entry fails the whole scan.
pub fn scan_migration_files(dir: &Path) -> MigrationResult<Vec<MigrationFile>> {
    if !dir.is_dir() {
        return Err(MigrationError::Load(format!(
            "Migrations directory not found: {}",
            dir.display()
        )));
    }

    let pattern = Regex::new(MIGRATION_FILE_PATTERN)
        .map_err(|e| MigrationError::Load(format!("Invalid migration file pattern: {}", e)))?;

    let entries = fs::read_dir(dir).map_err(|e| {
        MigrationError::Load(format!("Failed to read migrations directory: {}", e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| MigrationError::Load(format!("Failed to read directory entry: {}", e)))?;

        if !entry.path().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(captures) = pattern.captures(&file_name) else {
            continue;
        };

        let version = captures[1].parse::<u32>().map_err(|e| {
            MigrationError::Load(format!("Invalid version prefix in {}: {}", file_name, e))
        })?;
        let name = captures[2].to_string();

        files.push(MigrationFile {
            path: entry.path(),
            file_name,
            version,
            name,
        });
    }

    // Zero-padded prefixes make lexical order numeric order up to 999.
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    tracing::debug!(count = files.len(), dir = %dir.display(), "Found migration files");
    Ok(files)
}
