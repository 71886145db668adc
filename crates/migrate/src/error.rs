//! Error types for the migration system

use crate::definitions::Direction;
use estate_docstore::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Migration errors.
///
/// Every variant is fatal for the command that produced it; nothing is
/// retried.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to load migrations: {0}")]
    Load(String),

    #[error("Duplicate migration version {version}: '{existing}' and '{duplicate}'")]
    DuplicateVersion {
        version: u32,
        existing: String,
        duplicate: String,
    },

    #[error("Invalid version {version} for migration '{name}': versions start at 1")]
    InvalidVersion { version: u32, name: String },

    #[error("Error {direction} migration {version} ({name}): {source}")]
    Transform {
        version: u32,
        name: String,
        direction: Direction,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Version bookkeeping failed: {0}")]
    Bookkeeping(#[from] StoreError),

    #[error("Migration {version} does not have a down function")]
    MissingDown { version: u32 },

    #[error("Cannot roll back to a negative version ({target})")]
    NegativeTarget { target: i64 },

    #[error("Migration name is required")]
    MissingName,

    #[error("Migration file already exists: {}", .0.display())]
    FileExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    pub(crate) fn transform(
        version: u32,
        name: &str,
        direction: Direction,
        source: anyhow::Error,
    ) -> Self {
        Self::Transform {
            version,
            name: name.to_string(),
            direction,
            source: source.into(),
        }
    }

    pub(crate) fn corrupt_record(err: serde_json::Error) -> Self {
        Self::Bookkeeping(StoreError::Serialization(err))
    }
}
