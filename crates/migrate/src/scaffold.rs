//! Migration Scaffolder - writes new migration source files
//!
//! Generated files follow the `NNN_snake_name.rs` convention and expose a
//! `migration()` constructor to add to the registry.

use std::fs;
use std::path::PathBuf;

use crate::error::{MigrationError, MigrationResult};

const MIGRATION_TEMPLATE: &str = r#"//! Migration: __TITLE__

use async_trait::async_trait;
use estate_docstore::DocumentStore;
use estate_migrate::{MigrationContext, MigrationDescriptor, Transform};

pub const VERSION: u32 = __VERSION__;
pub const NAME: &str = "__NAME__";

pub fn migration() -> MigrationDescriptor {
    MigrationDescriptor::new(VERSION, NAME, Up)
        .with_description("TODO: Add description")
        .with_down(Down)
        .with_file_name("__FILE__")
}

struct Up;

#[async_trait]
impl Transform for Up {
    async fn run(&self, _db: &dyn DocumentStore, _ctx: &MigrationContext) -> anyhow::Result<()> {
        tracing::info!("Applying migration {}: {}", VERSION, NAME);

        // Example: create or update a document
        // _db.set("someCollection", "someDoc", serde_json::json!({
        //     "field": "value",
        //     "createdAt": _ctx.timestamp.clone(),
        // })).await?;

        Ok(())
    }
}

struct Down;

#[async_trait]
impl Transform for Down {
    async fn run(&self, _db: &dyn DocumentStore, _ctx: &MigrationContext) -> anyhow::Result<()> {
        tracing::info!("Rolling back migration {}: {}", VERSION, NAME);

        // Example: delete the document created in the up migration
        // _db.delete("someCollection", "someDoc").await?;

        Ok(())
    }
}
"#;

/// Migration file generator for a versions directory
#[derive(Debug, Clone)]
pub struct MigrationScaffolder {
    dir: PathBuf,
}

impl MigrationScaffolder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the file for the version after `latest` and return its path
    pub fn create(&self, name: &str, latest: u32) -> MigrationResult<PathBuf> {
        let snake_name = snake_case(name);
        if snake_name.is_empty() {
            return Err(MigrationError::MissingName);
        }
        let title = name.split_whitespace().collect::<Vec<_>>().join(" ");

        let version = latest + 1;
        let file_name = migration_file_name(version, &snake_name);

        // Ensure migrations directory exists
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(&file_name);
        if path.exists() {
            return Err(MigrationError::FileExists(path));
        }

        fs::write(&path, render_template(&title, &snake_name, version, &file_name))?;

        tracing::info!("Created migration file: {}", path.display());
        Ok(path)
    }
}

/// Lowercased `[a-z0-9_]` form of `name`.
///
/// Any run of other characters becomes a single `_`; leading and trailing
/// separators are dropped, so the result may be empty.
pub fn snake_case(name: &str) -> String {
    let mut snake = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            snake.push(c);
        } else if !snake.is_empty() && !snake.ends_with('_') {
            snake.push('_');
        }
    }
    while snake.ends_with('_') {
        snake.pop();
    }
    snake
}

/// `NNN_name.rs`, with the version zero-padded to three digits
pub fn migration_file_name(version: u32, snake_name: &str) -> String {
    format!("{:03}_{}.rs", version, snake_name)
}

fn render_template(title: &str, snake_name: &str, version: u32, file_name: &str) -> String {
    MIGRATION_TEMPLATE
        .replace("__TITLE__", title)
        .replace("__VERSION__", &version.to_string())
        .replace("__NAME__", snake_name)
        .replace("__FILE__", file_name)
}
