//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the descriptor every migration version provides, the context
//! handed to its transforms, the persisted bookkeeping records and the
//! results of running and inspecting migrations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use estate_docstore::{server_timestamp, Clock, DocumentStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::MigrationError;

/// One direction of a migration: a side-effecting change to the database
#[async_trait]
pub trait Transform: Send + Sync {
    async fn run(&self, db: &dyn DocumentStore, ctx: &MigrationContext) -> anyhow::Result<()>;
}

/// Context shared by every transform of a single run
#[derive(Debug, Clone)]
pub struct MigrationContext {
    /// Server timestamp token; resolved to the commit time when written
    pub timestamp: Value,
    clock: Arc<dyn Clock>,
}

impl MigrationContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            timestamp: server_timestamp(),
            clock,
        }
    }

    /// Timestamp construction facility of the target store
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// A versioned unit of data change
#[derive(Clone)]
pub struct MigrationDescriptor {
    /// Positive, unique version number
    pub version: u32,
    /// Human-readable name, typically snake_case
    pub name: String,
    pub description: String,
    /// Source file the descriptor was defined in (`NNN_name.rs`)
    pub file_name: Option<String>,
    up: Arc<dyn Transform>,
    down: Option<Arc<dyn Transform>>,
}

impl MigrationDescriptor {
    /// Create a descriptor with only a forward transform
    pub fn new(version: u32, name: impl Into<String>, up: impl Transform + 'static) -> Self {
        Self {
            version,
            name: name.into(),
            description: String::new(),
            file_name: None,
            up: Arc::new(up),
            down: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach the inverse transform used by rollback
    pub fn with_down(mut self, down: impl Transform + 'static) -> Self {
        self.down = Some(Arc::new(down));
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn up(&self) -> &dyn Transform {
        self.up.as_ref()
    }

    pub fn down(&self) -> Option<&dyn Transform> {
        self.down.as_deref()
    }

    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }
}

impl fmt::Debug for MigrationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDescriptor")
            .field("version", &self.version)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("file_name", &self.file_name)
            .field("reversible", &self.is_reversible())
            .finish()
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply the migration (run `up`)
    Up,
    /// Rollback the migration (run `down`)
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "applying"),
            Direction::Down => write!(f, "rolling back"),
        }
    }
}

/// The `current` document of the control collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A `v{version}` document of the control collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub applied_at: Option<DateTime<Utc>>,
}

/// A registered migration that has not been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMigration {
    pub version: u32,
    pub name: String,
    pub file_name: Option<String>,
}

impl From<&MigrationDescriptor> for PendingMigration {
    fn from(descriptor: &MigrationDescriptor) -> Self {
        Self {
            version: descriptor.version,
            name: descriptor.name.clone(),
            file_name: descriptor.file_name.clone(),
        }
    }
}

/// Result of a `migrate` or `rollback` run
#[derive(Debug)]
pub struct RunOutcome {
    pub direction: Direction,
    /// Version recorded before the run
    pub from: u32,
    /// Last version successfully recorded
    pub reached: u32,
    /// Versions whose transform ran and was recorded, in execution order
    pub steps: Vec<u32>,
    /// Set when the run stopped early
    pub error: Option<MigrationError>,
}

impl RunOutcome {
    pub(crate) fn start(direction: Direction, from: u32) -> Self {
        Self {
            direction,
            from,
            reached: from,
            steps: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn failed(mut self, error: MigrationError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// True when the run neither failed nor changed anything
    pub fn is_noop(&self) -> bool {
        self.is_success() && self.steps.is_empty()
    }

    /// Split off the error, if any
    pub fn into_result(mut self) -> Result<RunOutcome, MigrationError> {
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}

/// Snapshot produced by `status`
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub current: u32,
    /// Ascending by version
    pub pending: Vec<PendingMigration>,
    /// Descending by version, limited to versions `<= current`
    pub history: Vec<HistoryEntry>,
    /// Why the history could not be read, when it could not
    pub history_error: Option<String>,
    /// `NNN_*.rs` files on disk that are not registered
    pub unregistered_files: Vec<String>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current database version: {}", self.current)?;
        writeln!(f)?;
        writeln!(f, "Pending migrations: {}", self.pending.len())?;

        if !self.pending.is_empty() {
            writeln!(f)?;
            writeln!(f, "Pending:")?;
            for migration in &self.pending {
                writeln!(
                    f,
                    "  {}: {} ({})",
                    migration.version,
                    migration.name,
                    migration.file_name.as_deref().unwrap_or("built-in")
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Migration history:")?;
        if let Some(error) = &self.history_error {
            writeln!(f, "  Unavailable: {}", error)?;
        } else if self.history.is_empty() {
            writeln!(f, "  No migrations have been applied yet")?;
        } else {
            for entry in &self.history {
                let applied_at = entry
                    .applied_at
                    .map(|at| at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
                    .unwrap_or_else(|| "Unknown".to_string());
                writeln!(
                    f,
                    "  {}: {} (applied at {})",
                    entry.version, entry.name, applied_at
                )?;
            }
        }

        if !self.unregistered_files.is_empty() {
            writeln!(f)?;
            writeln!(f, "Files not registered in the migration registry:")?;
            for file in &self.unregistered_files {
                writeln!(f, "  {}", file)?;
            }
        }

        Ok(())
    }
}
